use async_trait::async_trait;
use newsflow_models::{Classification, Sentiment};
use rust_decimal::Decimal;

use crate::classifier::Classifier;
use crate::error::ClassifyError;
use crate::tickers::TickerMapper;

// Stems of five or more characters match any word they prefix; shorter
// entries match whole words only, so inflections are listed explicitly.
const POSITIVE_WORDS: &[&str] = &[
    "record", "beat", "beats", "surge", "jump", "jumps", "jumped", "rise", "rises", "rising",
    "rose", "gain", "gains", "gained", "profit", "growth", "positive", "up", "higher", "strong",
    "stronger", "exceed", "outperform", "success", "bullish", "rally", "rallies", "rallied",
    "soar", "soars", "soared", "upgrade",
];

const NEGATIVE_WORDS: &[&str] = &[
    "miss", "misses", "missed", "drop", "drops", "dropped", "fall", "falls", "fell", "decline",
    "loss", "losses", "down", "lower", "weak", "weaker", "weakness", "struggle", "underperform",
    "fail", "fails", "failed", "failure", "bearish", "plunge", "crash", "tumble", "disappoint",
    "cut", "cuts", "layoff", "bankrupt", "lawsuit", "infringement", "fine", "fines", "fined",
    "probe", "probes", "recall", "downgrade", "fraud",
];

/// Offline keyword-counting classifier.
///
/// Confidence is `0.5 + 0.1 * |positive - negative|`, capped at 0.9; a tie is
/// neutral at 0.5. Tickers come from the [`TickerMapper`].
pub struct KeywordClassifier {
    mapper: TickerMapper,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(TickerMapper::default())
    }
}

impl KeywordClassifier {
    pub fn new(mapper: TickerMapper) -> Self {
        Self { mapper }
    }

    /// Synchronous scoring used by the async trait impl.
    pub fn score(&self, text: &str) -> Classification {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let positive = words.iter().filter(|w| matches_any(w, POSITIVE_WORDS)).count() as i64;
        let negative = words.iter().filter(|w| matches_any(w, NEGATIVE_WORDS)).count() as i64;
        let diff = positive - negative;

        let sentiment = match diff {
            d if d > 0 => Sentiment::Positive,
            d if d < 0 => Sentiment::Negative,
            _ => Sentiment::Neutral,
        };
        let confidence = (Decimal::new(5, 1) + Decimal::new(1, 1) * Decimal::from(diff.abs()))
            .min(Decimal::new(9, 1));

        Classification {
            sentiment,
            confidence,
            tickers: self.mapper.extract(text),
        }
    }
}

fn matches_any(word: &str, list: &[&str]) -> bool {
    list.iter().any(|stem| {
        if stem.len() >= 5 {
            word.starts_with(stem)
        } else {
            word == *stem
        }
    })
}

#[async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        Ok(self.score(text))
    }
}

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Deterministic identity of a headline.
///
/// Derived from the normalized headline text plus the origin (source name or
/// url) when one is known, so repeated polling of the same story collapses to
/// a single id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeadlineId(pub Uuid);

impl HeadlineId {
    pub fn derive(text: &str, origin: Option<&str>) -> Self {
        let mut key = normalize_text(text);
        if let Some(origin) = origin.map(str::trim).filter(|o| !o.is_empty()) {
            key.push('|');
            key.push_str(&origin.to_lowercase());
        }
        Self(Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()))
    }
}

impl fmt::Display for HeadlineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lower-case the text and collapse every whitespace run to a single space.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Directional score: positive = +1, negative = -1, neutral = 0.
    pub fn score(&self) -> Decimal {
        match self {
            Sentiment::Positive => Decimal::ONE,
            Sentiment::Negative => Decimal::NEGATIVE_ONE,
            Sentiment::Neutral => Decimal::ZERO,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(format!("unknown sentiment label: {other}")),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a classifier backend for one headline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub sentiment: Sentiment,
    /// 0.0 to 1.0.
    pub confidence: Decimal,
    #[serde(default)]
    pub tickers: Vec<String>,
}

/// An article as delivered by a news source, before any processing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawArticle {
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl RawArticle {
    pub fn headline(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
            source: None,
            published_at: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    /// Source name if known, otherwise the url.
    pub fn origin(&self) -> Option<&str> {
        self.source.as_deref().or(self.url.as_deref())
    }

    pub fn id(&self) -> HeadlineId {
        HeadlineId::derive(&self.text, self.origin())
    }
}

/// Bookkeeping returned alongside a fetched batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchMetadata {
    pub pages_fetched: u32,
    pub total_raw: usize,
    pub filtered_count: usize,
}

/// Result of one `fetch_batch` call. May hold fewer articles than requested.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FetchedBatch {
    pub articles: Vec<RawArticle>,
    pub metadata: FetchMetadata,
}

/// A classified headline. Created once, never mutated afterwards; windows
/// hold shared references to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeadlineEvent {
    pub id: HeadlineId,
    pub text: String,
    /// Source timestamp, or ingestion time when the source gave none.
    pub published_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub sentiment: Sentiment,
    pub confidence: Decimal,
    pub tickers: BTreeSet<String>,
}

impl HeadlineEvent {
    pub fn new(
        article: &RawArticle,
        classification: &Classification,
        ingested_at: DateTime<Utc>,
    ) -> Self {
        let tickers = classification
            .tickers
            .iter()
            .map(|t| t.trim().trim_start_matches('$').to_uppercase())
            .filter(|t| !t.is_empty())
            .collect();

        Self {
            id: article.id(),
            text: article.text.clone(),
            published_at: article.published_at.unwrap_or(ingested_at),
            ingested_at,
            sentiment: classification.sentiment,
            confidence: classification.confidence,
            tickers,
        }
    }

    /// Sentiment direction scaled by confidence, in [-1, 1].
    pub fn weighted_score(&self) -> Decimal {
        self.sentiment.score() * self.confidence
    }
}

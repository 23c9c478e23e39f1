use std::sync::Mutex;

use async_trait::async_trait;
use newsflow_models::{FetchMetadata, FetchedBatch, RawArticle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::NewsSource;
use crate::error::SourceError;

const COMPANIES: &[&str] = &[
    "Apple", "Microsoft", "Amazon", "Google", "Facebook", "Tesla", "Netflix", "Nvidia",
    "JPMorgan", "Goldman Sachs", "Bank of America", "Walmart", "Disney", "Coca-Cola", "Intel",
    "AMD", "IBM",
];

const MARKETS: &[&str] = &["US", "European", "Asian", "global", "emerging"];

const POSITIVE: &[&str] = &[
    "{company} reports record earnings in Q{quarter}",
    "{company} stock surges after beating analyst expectations",
    "{company} announces new product line, shares jump",
    "{company} expands into {market} markets, investors optimistic",
    "{company} raises guidance for fiscal year",
    "{company} CEO announces ambitious growth plans",
    "Analysts upgrade {company} to 'buy' rating",
    "{company} partners with {partner} in strategic alliance",
];

const NEGATIVE: &[&str] = &[
    "{company} misses earnings expectations in Q{quarter}",
    "{company} stock plunges on disappointing results",
    "{company} announces layoffs amid restructuring",
    "{company} faces regulatory scrutiny in {market} markets",
    "{company} lowers guidance for fiscal year",
    "{company} CEO steps down amid controversy",
    "Analysts downgrade {company} to 'sell' rating",
    "{company} loses market share to {partner}",
];

const NEUTRAL: &[&str] = &[
    "{company} reports Q{quarter} earnings in line with expectations",
    "{company} maintains current outlook for fiscal year",
    "{company} announces management changes",
    "{company} to present at upcoming investor conference",
    "{company} releases statement on {market} conditions",
    "{company} neither confirms nor denies {partner} acquisition rumors",
    "Analysts maintain 'hold' rating on {company}",
    "{company} completes previously announced share repurchase program",
];

/// Synthetic headline generator for demos and soak runs.
///
/// Mix is roughly 40% positive, 30% neutral, 30% negative. The template space
/// is small, so repeats (and therefore duplicates) are common over time.
pub struct SimulatedSource {
    rng: Mutex<StdRng>,
}

impl SimulatedSource {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    fn headline(rng: &mut StdRng) -> String {
        let company = pick(rng, COMPANIES);
        let partner = loop {
            let p = pick(rng, COMPANIES);
            if p != company {
                break p;
            }
        };
        let quarter = rng.gen_range(1..=4);
        let market = pick(rng, MARKETS);

        let roll: f64 = rng.gen();
        let templates = if roll > 0.6 {
            POSITIVE
        } else if roll > 0.3 {
            NEUTRAL
        } else {
            NEGATIVE
        };

        pick(rng, templates)
            .replace("{company}", company)
            .replace("{partner}", partner)
            .replace("{quarter}", &quarter.to_string())
            .replace("{market}", market)
    }
}

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items[rng.gen_range(0..items.len())]
}

#[async_trait]
impl NewsSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn fetch_batch(&self, target: usize) -> Result<FetchedBatch, SourceError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|e| SourceError::Unavailable(format!("rng lock poisoned: {e}")))?;
        let articles: Vec<RawArticle> = (0..target)
            .map(|_| RawArticle::headline(Self::headline(&mut rng)).with_source("simulated"))
            .collect();

        Ok(FetchedBatch {
            metadata: FetchMetadata {
                pages_fetched: 1,
                total_raw: articles.len(),
                filtered_count: articles.len(),
            },
            articles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_output_is_reproducible() {
        let a = SimulatedSource::new(Some(42)).fetch_batch(5).await.unwrap();
        let b = SimulatedSource::new(Some(42)).fetch_batch(5).await.unwrap();
        assert_eq!(a.articles, b.articles);
        assert_eq!(a.articles.len(), 5);
        assert_eq!(a.metadata.total_raw, 5);
    }

    #[tokio::test]
    async fn templates_are_filled() {
        let batch = SimulatedSource::new(Some(7)).fetch_batch(50).await.unwrap();
        for article in &batch.articles {
            assert!(!article.text.contains('{'), "unfilled: {}", article.text);
            assert_eq!(article.source.as_deref(), Some("simulated"));
            assert!(COMPANIES.iter().any(|c| article.text.contains(c)));
        }
    }

    #[tokio::test]
    async fn zero_target_is_empty() {
        let batch = SimulatedSource::new(None).fetch_batch(0).await.unwrap();
        assert!(batch.articles.is_empty());
    }
}

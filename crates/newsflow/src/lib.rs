//! Newsflow - headline sentiment to per-ticker trading signals
//!
//! Classifies financial headlines, aggregates confidence-weighted sentiment
//! per ticker over a rolling window, and derives LONG / SHORT / FLAT signals
//! with optional hysteresis.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use newsflow::models::{NewsflowConfig, HeadlineOutcome, SignalState};
//! use newsflow::pipeline::{Coordinator, Daemon, NewsSource};
//! use newsflow::classify::{Classifier, KeywordClassifier};
//! ```

pub use newsflow_classify as classify;
pub use newsflow_models as models;
pub use newsflow_pipeline as pipeline;
pub use newsflow_store as store;

use std::sync::Arc;

use newsflow_models::{HeadlineOutcome, NewsflowConfig};
use newsflow_pipeline::{Coordinator, PipelineError};
use serde::Serialize;

/// Result of submitting one headline from the CLI.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Submission {
    Processed(HeadlineOutcome),
    Rejected { status: &'static str, text: String, reason: String },
}

/// Build a Coordinator from configuration.
pub fn build_coordinator(config: NewsflowConfig) -> Result<Arc<Coordinator>, anyhow::Error> {
    Ok(newsflow_pipeline::build_coordinator(config)?)
}

/// Submit headlines one at a time, in order.
///
/// Invalid headlines are reported and skipped; they do not stop the rest.
pub async fn submit_headlines<I, S>(
    coordinator: &Coordinator,
    headlines: I,
) -> Result<Vec<Submission>, PipelineError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut submissions = Vec::new();
    for text in headlines {
        let text = text.as_ref();
        match coordinator.submit_headline(text).await {
            Ok(outcome) => submissions.push(Submission::Processed(outcome)),
            Err(PipelineError::InvalidHeadline(reason)) => submissions.push(Submission::Rejected {
                status: "invalid",
                text: text.to_string(),
                reason,
            }),
            Err(e) => return Err(e),
        }
    }
    Ok(submissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsflow_models::Signal;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn submit_mixed_apple_news() {
        let coordinator = build_coordinator(NewsflowConfig::default()).unwrap();
        let submissions = submit_headlines(
            &coordinator,
            [
                "Apple beats earnings, stock surges",
                "no",
                "Apple faces lawsuit over patent infringement",
            ],
        )
        .await
        .unwrap();

        assert_eq!(submissions.len(), 3);
        assert!(matches!(
            &submissions[0],
            Submission::Processed(HeadlineOutcome::Accepted { .. })
        ));
        assert!(matches!(&submissions[1], Submission::Rejected { .. }));

        let signals = coordinator.current_signals().unwrap();
        assert_eq!(signals["AAPL"].signal, Signal::Flat);
        assert_eq!(coordinator.summarize("AAPL").unwrap().mean_sentiment, dec!(0));
    }

    #[test]
    fn rejected_serializes_flat() {
        let json = serde_json::to_value(Submission::Rejected {
            status: "invalid",
            text: "no".to_string(),
            reason: "too short".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "invalid");
        assert_eq!(json["text"], "no");
    }
}

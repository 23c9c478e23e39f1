//! Classifier doubles for pipeline tests.
//!
//! `ScriptedClassifier` answers from a fixed table keyed by headline text,
//! `FailingClassifier` always errors and `SlowClassifier` sleeps before
//! delegating, which lets tests exercise timeouts and backpressure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use newsflow_models::{Classification, Sentiment};
use rust_decimal::Decimal;

use crate::classifier::Classifier;
use crate::error::ClassifyError;

/// Returns scripted classifications; unknown text is neutral with no tickers.
#[derive(Default)]
pub struct ScriptedClassifier {
    answers: HashMap<String, Classification>,
    failures: HashMap<String, String>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(
        mut self,
        text: &str,
        sentiment: Sentiment,
        confidence: Decimal,
        tickers: &[&str],
    ) -> Self {
        self.answers.insert(
            text.to_string(),
            Classification {
                sentiment,
                confidence,
                tickers: tickers.iter().map(|t| t.to_string()).collect(),
            },
        );
        self
    }

    /// Make `text` fail with `ClassifyError::Unavailable`.
    pub fn fail_on(mut self, text: &str, reason: &str) -> Self {
        self.failures.insert(text.to_string(), reason.to_string());
        self
    }

    /// Number of `classify` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.failures.get(text) {
            return Err(ClassifyError::Unavailable(reason.clone()));
        }
        Ok(self.answers.get(text).cloned().unwrap_or(Classification {
            sentiment: Sentiment::Neutral,
            confidence: Decimal::new(5, 1),
            tickers: Vec::new(),
        }))
    }
}

/// Always fails.
pub struct FailingClassifier;

#[async_trait]
impl Classifier for FailingClassifier {
    fn name(&self) -> &str {
        "failing"
    }

    async fn classify(&self, _text: &str) -> Result<Classification, ClassifyError> {
        Err(ClassifyError::Unavailable("backend offline".to_string()))
    }
}

/// Sleeps for `delay` then delegates. Tracks peak concurrency.
pub struct SlowClassifier<C> {
    inner: C,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl<C: Classifier> SlowClassifier<C> {
    pub fn new(inner: C, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Highest number of simultaneous `classify` calls observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: Classifier> Classifier for SlowClassifier<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = self.inner.classify(text).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use newsflow_classify::{check_contract, Classifier, ClassifyError};
use newsflow_models::{
    AggregateSummary, FetchMetadata, HeadlineEvent, HeadlineId, HeadlineOutcome, HeadlineProcessed,
    NewsflowConfig, PipelineEvent, RawArticle, SignalState, SignalTransition, SystemStatus,
};
use newsflow_store::{DedupCache, SentimentWindowStore};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::broadcast::{Broadcaster, Subscription};
use crate::clock::{Clock, SystemClock};
use crate::decision::SignalEngine;
use crate::error::{PipelineError, SourceError};
use crate::sources::NewsSource;
use crate::stats::{bump, PipelineStats};

/// Per-tick summary returned by [`Coordinator::run_tick`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TickReport {
    pub metadata: FetchMetadata,
    pub fetched: usize,
    pub accepted: usize,
    pub no_tickers: usize,
    pub duplicates: usize,
    pub unclassified: usize,
    pub invalid: usize,
    pub errors: usize,
    pub signal_changes: usize,
    pub elapsed_ms: u64,
}

impl TickReport {
    fn record(&mut self, outcome: &HeadlineOutcome) {
        match outcome {
            HeadlineOutcome::Accepted { .. } => self.accepted += 1,
            HeadlineOutcome::NoTickers { .. } => self.no_tickers += 1,
            HeadlineOutcome::Duplicate { .. } => self.duplicates += 1,
            HeadlineOutcome::Unclassified { .. } => self.unclassified += 1,
        }
    }
}

/// Result of one [`Coordinator::cleanup`] pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CleanupReport {
    pub dedup_swept: usize,
    pub evicted: usize,
    pub signal_changes: usize,
    pub pruned: Vec<String>,
}

/// Drives headlines through dedup, classification, aggregation and
/// publication.
///
/// Every headline, fetched or submitted by hand, goes through
/// [`Coordinator::process_article`]. Aggregation for a ticker happens inside
/// that ticker's window lock: insert, summarize, decide and publish are one
/// critical section, so same-ticker signal changes are published in decision
/// order while different tickers proceed in parallel.
pub struct Coordinator {
    config: NewsflowConfig,
    classifier: Arc<dyn Classifier>,
    clock: Arc<dyn Clock>,
    dedup: DedupCache,
    windows: SentimentWindowStore,
    engine: SignalEngine,
    broadcaster: Broadcaster,
    stats: PipelineStats,
}

impl Coordinator {
    pub fn new(
        config: NewsflowConfig,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self, PipelineError> {
        Self::with_clock(config, classifier, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: NewsflowConfig,
        classifier: Arc<dyn Classifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let pipeline = &config.pipeline;
        Ok(Self {
            dedup: DedupCache::new(pipeline.dedup_max_capacity, pipeline.window_span_seconds),
            windows: SentimentWindowStore::new(pipeline.window_span()),
            engine: SignalEngine::new(config.signal.clone(), pipeline.history_limit),
            broadcaster: Broadcaster::new(pipeline.subscriber_queue_capacity),
            stats: PipelineStats::default(),
            classifier,
            clock,
            config,
        })
    }

    pub fn config(&self) -> &NewsflowConfig {
        &self.config
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Validate and process one manually submitted headline.
    ///
    /// Text shorter than `min_headline_chars` after trimming is rejected with
    /// [`PipelineError::InvalidHeadline`] before anything else happens.
    pub async fn submit_headline(&self, text: &str) -> Result<HeadlineOutcome, PipelineError> {
        self.submit_article(RawArticle::headline(text.trim())).await
    }

    /// Like [`Coordinator::submit_headline`], for an article with metadata.
    pub async fn submit_article(
        &self,
        article: RawArticle,
    ) -> Result<HeadlineOutcome, PipelineError> {
        self.validate(&article)?;
        self.process_article(article).await
    }

    fn validate(&self, article: &RawArticle) -> Result<(), PipelineError> {
        let chars = article.text.trim().chars().count();
        let min = self.config.pipeline.min_headline_chars;
        if chars < min {
            bump(&self.stats.invalid_rejected);
            return Err(PipelineError::InvalidHeadline(format!(
                "headline has {chars} characters, at least {min} required"
            )));
        }
        Ok(())
    }

    /// The single path every accepted headline takes.
    ///
    /// Duplicates and classification failures are outcomes, not errors; only
    /// internal faults (poisoned locks) surface as `Err`.
    pub async fn process_article(
        &self,
        article: RawArticle,
    ) -> Result<HeadlineOutcome, PipelineError> {
        bump(&self.stats.headlines_seen);
        let id = article.id();

        if self.dedup.seen(&id) {
            bump(&self.stats.duplicates);
            debug!(%id, "Duplicate headline dropped");
            return Ok(HeadlineOutcome::Duplicate { id });
        }

        let classification = match self.classify(&article.text).await {
            Ok(c) => c,
            Err(e) => {
                bump(&self.stats.classification_failures);
                warn!(%id, error = %e, "Could not classify headline");
                return Ok(HeadlineOutcome::Unclassified {
                    id,
                    reason: e.to_string(),
                });
            }
        };

        let now = self.clock.now();
        // Two workers may classify the same headline concurrently; only the
        // one that records it first aggregates it.
        if !self.dedup.record(id, now).await {
            bump(&self.stats.duplicates);
            debug!(%id, "Duplicate headline dropped after classification");
            return Ok(HeadlineOutcome::Duplicate { id });
        }

        let event = Arc::new(HeadlineEvent::new(&article, &classification, now));
        debug!(
            %id,
            sentiment = %event.sentiment,
            confidence = %event.confidence,
            tickers = ?event.tickers,
            "Headline classified"
        );

        if event.tickers.is_empty() {
            bump(&self.stats.no_ticker);
            self.broadcaster
                .publish(PipelineEvent::HeadlineProcessed(HeadlineProcessed {
                    event: (*event).clone(),
                    signals: Vec::new(),
                }));
            return Ok(HeadlineOutcome::NoTickers {
                event: (*event).clone(),
            });
        }

        let mut signals = Vec::with_capacity(event.tickers.len());
        for ticker in &event.tickers {
            let state = self.windows.with_window(ticker, |window| {
                if !window.insert(event.clone()) {
                    return Ok(None);
                }
                // Read under the lock so decisions for a ticker never go back in time.
                let summary = window.summarize(self.clock.now());
                self.decide_and_publish(&summary, Some(id)).map(Some)
            })??;
            signals.extend(state);
        }

        // Still held by every window after its dedup entry expired.
        if signals.is_empty() {
            bump(&self.stats.duplicates);
            debug!(%id, "Headline already in its ticker windows");
            return Ok(HeadlineOutcome::Duplicate { id });
        }

        bump(&self.stats.accepted);
        self.broadcaster
            .publish(PipelineEvent::HeadlineProcessed(HeadlineProcessed {
                event: (*event).clone(),
                signals: signals.clone(),
            }));

        Ok(HeadlineOutcome::Accepted {
            event: (*event).clone(),
            signals,
        })
    }

    async fn classify(
        &self,
        text: &str,
    ) -> Result<newsflow_models::Classification, ClassifyError> {
        let timeout = self.config.pipeline.classify_timeout();
        let classification = tokio::time::timeout(timeout, self.classifier.classify(text))
            .await
            .map_err(|_| ClassifyError::Timeout(timeout))??;
        check_contract(classification)
    }

    /// Must be called with the ticker's window lock held.
    fn decide_and_publish(
        &self,
        summary: &AggregateSummary,
        headline_id: Option<HeadlineId>,
    ) -> Result<SignalState, PipelineError> {
        let (state, transition) = self.engine.apply(summary, headline_id)?;
        if let Some(transition) = transition {
            bump(&self.stats.signal_changes);
            info!(
                ticker = %transition.ticker,
                from = %transition.previous.signal,
                to = %transition.current.signal,
                confidence = %transition.current.confidence,
                headlines = summary.headline_count,
                "Signal changed"
            );
            self.broadcaster
                .publish(PipelineEvent::SignalChanged(transition));
        }
        Ok(state)
    }

    /// Fetch one batch from `source` and process it on a bounded worker pool.
    ///
    /// A fetch failure or timeout is counted and returned; nothing else about
    /// the coordinator changes, so the next tick starts clean.
    pub async fn run_tick(
        self: &Arc<Self>,
        source: &dyn NewsSource,
    ) -> Result<TickReport, PipelineError> {
        let start = Instant::now();
        bump(&self.stats.fetch_ticks);

        let fetch_timeout = self.config.pipeline.fetch_timeout();
        let fetched = tokio::time::timeout(
            fetch_timeout,
            source.fetch_batch(self.config.pipeline.fetch_batch_size),
        )
        .await
        .unwrap_or(Err(SourceError::Timeout(fetch_timeout)));

        let batch = match fetched {
            Ok(batch) => {
                self.stats.fetch_succeeded();
                batch
            }
            Err(e) => {
                self.stats.fetch_failed();
                warn!(source = source.name(), error = %e, "News fetch failed, skipping tick");
                return Err(e.into());
            }
        };

        let mut report = TickReport {
            metadata: batch.metadata.clone(),
            fetched: batch.articles.len(),
            ..TickReport::default()
        };

        let semaphore = Arc::new(Semaphore::new(self.config.pipeline.classify_workers));
        let mut join_set = JoinSet::new();
        for article in batch.articles {
            if self.validate(&article).is_err() {
                report.invalid += 1;
                continue;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let coordinator = Arc::clone(self);
            join_set.spawn(async move {
                let _permit = permit;
                coordinator.process_article(article).await
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(outcome)) => report.record(&outcome),
                Ok(Err(e)) => {
                    report.errors += 1;
                    error!(error = %e, "Headline processing failed");
                }
                Err(e) => {
                    report.errors += 1;
                    error!(error = %e, "Headline worker panicked");
                }
            }
        }

        report.signal_changes = self.refresh_signals()?.len();
        report.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            source = source.name(),
            fetched = report.fetched,
            accepted = report.accepted,
            duplicates = report.duplicates,
            unclassified = report.unclassified,
            elapsed_ms = report.elapsed_ms,
            "Fetch tick complete"
        );
        Ok(report)
    }

    /// Re-summarize every ticker at the current time and publish signal
    /// changes caused by headlines ageing out of their windows.
    pub fn refresh_signals(&self) -> Result<Vec<SignalTransition>, PipelineError> {
        let now = self.clock.now();
        let mut transitions = Vec::new();
        for ticker in self.windows.tickers()? {
            let transition = self.windows.with_window(&ticker, |window| {
                let summary = window.summarize(now);
                let (_, transition) = self.engine.apply(&summary, None)?;
                if let Some(t) = &transition {
                    bump(&self.stats.signal_changes);
                    info!(
                        ticker = %t.ticker,
                        from = %t.previous.signal,
                        to = %t.current.signal,
                        "Signal changed on re-evaluation"
                    );
                    self.broadcaster
                        .publish(PipelineEvent::SignalChanged(t.clone()));
                }
                Ok::<_, PipelineError>(transition)
            })??;
            transitions.extend(transition);
        }
        Ok(transitions)
    }

    /// Housekeeping: sweep the dedup cache, evict stale window entries,
    /// re-evaluate signals, and drop windows idle for a full window span.
    pub async fn cleanup(&self) -> Result<CleanupReport, PipelineError> {
        let now = self.clock.now();
        let dedup_swept = self.dedup.sweep(now).await;
        let evicted = self.windows.evict_stale(now)?;
        let signal_changes = self.refresh_signals()?.len();

        let pruned = self
            .windows
            .prune_idle(now, self.config.pipeline.window_span())?;
        for ticker in &pruned {
            self.engine.forget_if_flat(ticker)?;
        }

        if dedup_swept > 0 || evicted > 0 || !pruned.is_empty() {
            info!(
                dedup_swept,
                evicted,
                pruned = pruned.len(),
                "Cleanup complete"
            );
        }
        Ok(CleanupReport {
            dedup_swept,
            evicted,
            signal_changes,
            pruned,
        })
    }

    pub fn current_signals(&self) -> Result<BTreeMap<String, SignalState>, PipelineError> {
        self.engine.current_signals()
    }

    /// Recent signal transitions, oldest first, capped at `history_limit`.
    pub fn signal_history(&self) -> Result<Vec<SignalTransition>, PipelineError> {
        self.engine.history()
    }

    /// Summary of `ticker` at the current time.
    pub fn summarize(&self, ticker: &str) -> Result<AggregateSummary, PipelineError> {
        Ok(self.windows.summarize(ticker, self.clock.now())?)
    }

    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        self.broadcaster.unsubscribe(subscription);
    }

    pub fn status(&self) -> Result<SystemStatus, PipelineError> {
        Ok(SystemStatus {
            classifier: self.classifier.name().to_string(),
            tracked_tickers: self.windows.tickers()?,
            subscribers: self.broadcaster.subscriber_count(),
            stats: self.stats.snapshot(self.broadcaster.dropped_total()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use newsflow_classify::test_support::ScriptedClassifier;
    use newsflow_models::{Sentiment, Signal};
    use rust_decimal_macros::dec;

    use crate::clock::ManualClock;

    fn coordinator(classifier: ScriptedClassifier) -> (Coordinator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
        ));
        let coordinator =
            Coordinator::with_clock(NewsflowConfig::default(), Arc::new(classifier), clock.clone())
                .unwrap();
        (coordinator, clock)
    }

    #[tokio::test]
    async fn rejects_short_headline() {
        let (c, _) = coordinator(ScriptedClassifier::new());
        let err = c.submit_headline("  hi ").await;
        assert!(matches!(err, Err(PipelineError::InvalidHeadline(_))));
        assert_eq!(c.status().unwrap().stats.invalid_rejected, 1);
        assert_eq!(c.status().unwrap().stats.headlines_seen, 0);
    }

    #[tokio::test]
    async fn accepted_headline_updates_window() {
        let (c, _) = coordinator(ScriptedClassifier::new().answer(
            "Nvidia soars",
            Sentiment::Positive,
            dec!(0.8),
            &["NVDA"],
        ));
        let outcome = c.submit_headline("Nvidia soars").await.unwrap();
        assert!(outcome.is_accepted());

        let summary = c.summarize("NVDA").unwrap();
        assert_eq!(summary.headline_count, 1);
        assert_eq!(summary.mean_sentiment, dec!(0.8));
        assert_eq!(c.current_signals().unwrap()["NVDA"].signal, Signal::Flat);
    }

    #[tokio::test]
    async fn eviction_flattens_on_refresh() {
        let (c, clock) = coordinator(
            ScriptedClassifier::new()
                .answer("Tesla one", Sentiment::Positive, dec!(0.9), &["TSLA"])
                .answer("Tesla two", Sentiment::Positive, dec!(0.9), &["TSLA"]),
        );
        c.submit_headline("Tesla one").await.unwrap();
        c.submit_headline("Tesla two").await.unwrap();
        assert_eq!(c.current_signals().unwrap()["TSLA"].signal, Signal::Long);

        clock.advance(Duration::hours(9));
        let transitions = c.refresh_signals().unwrap();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].current.signal, Signal::Flat);
        assert!(transitions[0].headline_id.is_none());
    }

    #[tokio::test]
    async fn cleanup_prunes_idle_windows() {
        let (c, clock) = coordinator(ScriptedClassifier::new().answer(
            "Intel news today",
            Sentiment::Neutral,
            dec!(0.5),
            &["INTC"],
        ));
        c.submit_headline("Intel news today").await.unwrap();

        clock.advance(Duration::hours(1));
        let report = c.cleanup().await.unwrap();
        assert_eq!(report.evicted, 0);
        assert!(report.pruned.is_empty());

        clock.advance(Duration::hours(8));
        let report = c.cleanup().await.unwrap();
        assert_eq!(report.dedup_swept, 1);
        assert_eq!(report.evicted, 1);
        assert_eq!(report.pruned, vec!["INTC"]);
        assert!(c.current_signals().unwrap().is_empty());
        assert!(c.status().unwrap().tracked_tickers.is_empty());
    }

    #[tokio::test]
    async fn future_dated_headline_counts_once_after_dedup_sweep() {
        let (c, clock) = coordinator(ScriptedClassifier::new().answer(
            "Apple schedules product event",
            Sentiment::Positive,
            dec!(0.6),
            &["AAPL"],
        ));
        let start = clock.now();
        let article = RawArticle::headline("Apple schedules product event")
            .published(start + Duration::hours(12));

        let first = c.submit_article(article.clone()).await.unwrap();
        assert!(first.is_accepted());

        clock.advance(Duration::hours(9));
        let report = c.cleanup().await.unwrap();
        assert_eq!(report.dedup_swept, 1);
        assert!(report.pruned.is_empty());

        let again = c.submit_article(article).await.unwrap();
        assert!(matches!(again, HeadlineOutcome::Duplicate { .. }));
        let stats = c.status().unwrap().stats;
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.duplicates, 1);

        clock.advance(Duration::hours(3));
        assert_eq!(c.summarize("AAPL").unwrap().headline_count, 1);
    }

    #[tokio::test]
    async fn decisions_use_time_of_aggregation() {
        let (c, clock) = coordinator(
            ScriptedClassifier::new()
                .answer("Amazon wins contract", Sentiment::Positive, dec!(0.9), &["AMZN"])
                .answer("Amazon expands again", Sentiment::Positive, dec!(0.9), &["AMZN"]),
        );
        c.submit_headline("Amazon wins contract").await.unwrap();
        clock.advance(Duration::minutes(5));
        c.submit_headline("Amazon expands again").await.unwrap();

        let state = &c.current_signals().unwrap()["AMZN"];
        assert_eq!(state.signal, Signal::Long);
        assert_eq!(state.last_updated, clock.now());
    }

    #[test]
    fn oversized_window_span_is_rejected() {
        let mut config = NewsflowConfig::default();
        config.pipeline.window_span_seconds = 40_000_000_000;
        let result = Coordinator::new(config, Arc::new(ScriptedClassifier::new()));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}

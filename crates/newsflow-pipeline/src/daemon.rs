use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use newsflow_models::PipelineEvent;
use newsflow_store::SignalJournal;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::broadcast::Subscription;
use crate::coordinator::Coordinator;
use crate::error::PipelineError;
use crate::sources::NewsSource;

/// The pipeline daemon. Runs periodic fetch ticks, housekeeping, and the
/// optional transition journal until cancelled.
pub struct Daemon {
    coordinator: Arc<Coordinator>,
    source: Option<Arc<dyn NewsSource>>,
    journal: Option<Arc<Mutex<SignalJournal>>>,
    trigger: Arc<Notify>,
    cancel: CancellationToken,
}

impl Daemon {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            source: None,
            journal: None,
            trigger: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn NewsSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_journal(mut self, journal: SignalJournal) -> Self {
        self.journal = Some(Arc::new(Mutex::new(journal)));
        self
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Returns a CancellationToken that can be used to trigger shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run a fetch tick now instead of waiting for the interval.
    pub fn trigger_fetch(&self) {
        self.trigger.notify_one();
    }

    /// Run the daemon until cancelled.
    pub async fn run(&self) -> Result<(), PipelineError> {
        tracing::info!(
            classifier = %self.coordinator.status()?.classifier,
            source = self.source.as_ref().map(|s| s.name()).unwrap_or("none"),
            "Newsflow daemon starting"
        );

        let pipeline = self.coordinator.config().pipeline.clone();
        let mut join_set = tokio::task::JoinSet::new();

        // Task 1: periodic (or triggered) fetch ticks
        if let Some(source) = &self.source {
            let coordinator = self.coordinator.clone();
            let source = source.clone();
            let trigger = self.trigger.clone();
            let cancel = self.cancel.clone();
            let interval = pipeline.fetch_interval();
            join_set.spawn(async move {
                fetch_loop(coordinator, source, interval, trigger, cancel).await;
            });
        } else {
            tracing::info!("No news source configured; accepting manual submissions only");
        }

        // Task 2: transition journal
        if let Some(journal) = &self.journal {
            let subscription = self.coordinator.subscribe();
            let journal = journal.clone();
            let cancel = self.cancel.clone();
            join_set.spawn(async move {
                journal_loop(journal, subscription, cancel).await;
            });
        }

        // Task 3: dedup sweep, window eviction, re-evaluation, journal retention
        {
            let coordinator = self.coordinator.clone();
            let journal = self.journal.clone();
            let retention = self.coordinator.config().journal.retention();
            let interval = pipeline.cleanup_interval();
            let cancel = self.cancel.clone();
            join_set.spawn(async move {
                cleanup_loop(coordinator, journal, retention, interval, cancel).await;
            });
        }

        tracing::info!("All daemon tasks started");

        while join_set.join_next().await.is_some() {}

        tracing::info!("Newsflow daemon stopped");
        Ok(())
    }
}

/// Fetch loop: one tick immediately, then every `interval` or on trigger.
///
/// Manual triggers run in between and do not move the schedule.
pub async fn fetch_loop(
    coordinator: Arc<Coordinator>,
    source: Arc<dyn NewsSource>,
    interval: Duration,
    trigger: Arc<Notify>,
    cancel: CancellationToken,
) {
    let mut schedule = tokio::time::interval(interval);
    schedule.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Fetch loop shutting down");
                break;
            }
            _ = schedule.tick() => {
                run_fetch_tick(&coordinator, source.as_ref()).await;
            }
            _ = trigger.notified() => {
                tracing::info!("Manual fetch triggered");
                run_fetch_tick(&coordinator, source.as_ref()).await;
            }
        }
    }
}

async fn run_fetch_tick(coordinator: &Arc<Coordinator>, source: &dyn NewsSource) {
    if let Err(e) = coordinator.run_tick(source).await {
        let failures = coordinator
            .status()
            .map(|s| s.stats.consecutive_fetch_failures)
            .unwrap_or_default();
        tracing::warn!(error = %e, consecutive_failures = failures, "Fetch tick failed");
    }
}

/// Append every signal change seen on `subscription` to the journal.
pub async fn journal_loop(
    journal: Arc<Mutex<SignalJournal>>,
    mut subscription: Subscription,
    cancel: CancellationToken,
) {
    tracing::info!("Journal loop started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Journal loop shutting down");
                break;
            }
            event = subscription.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event stream closed");
                    break;
                };
                let PipelineEvent::SignalChanged(transition) = event.as_ref() else {
                    continue;
                };
                match journal.lock() {
                    Ok(j) => {
                        if let Err(e) = j.record(transition) {
                            tracing::error!(ticker = %transition.ticker, error = %e, "Failed to journal transition");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Journal lock poisoned");
                    }
                }
            }
        }
    }
}

/// Periodic housekeeping.
pub async fn cleanup_loop(
    coordinator: Arc<Coordinator>,
    journal: Option<Arc<Mutex<SignalJournal>>>,
    retention: chrono::Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut schedule = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    schedule.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Cleanup loop shutting down");
                break;
            }
            _ = schedule.tick() => {
                if let Err(e) = coordinator.cleanup().await {
                    tracing::error!(error = %e, "Cleanup failed");
                }
                if let Some(journal) = &journal {
                    prune_journal(journal, retention);
                }
            }
        }
    }
}

fn prune_journal(journal: &Mutex<SignalJournal>, retention: chrono::Duration) {
    match journal.lock() {
        Ok(j) => match j.prune_older_than(Utc::now() - retention) {
            Ok(deleted) if deleted > 0 => {
                tracing::info!(deleted, "Pruned old journal entries");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Journal prune failed");
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Journal lock poisoned during prune");
        }
    }
}

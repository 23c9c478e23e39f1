use std::sync::atomic::{AtomicU64, Ordering};

use newsflow_models::PipelineStatsSnapshot;

/// Lock-free counters updated by the coordinator and its workers.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub(crate) headlines_seen: AtomicU64,
    pub(crate) accepted: AtomicU64,
    pub(crate) duplicates: AtomicU64,
    pub(crate) classification_failures: AtomicU64,
    pub(crate) no_ticker: AtomicU64,
    pub(crate) invalid_rejected: AtomicU64,
    pub(crate) signal_changes: AtomicU64,
    pub(crate) fetch_ticks: AtomicU64,
    pub(crate) fetch_failures: AtomicU64,
    pub(crate) consecutive_fetch_failures: AtomicU64,
}

pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl PipelineStats {
    pub(crate) fn fetch_succeeded(&self) {
        self.consecutive_fetch_failures.store(0, Ordering::Relaxed);
    }

    pub(crate) fn fetch_failed(&self) {
        bump(&self.fetch_failures);
        bump(&self.consecutive_fetch_failures);
    }

    /// Point-in-time copy. `subscriber_drops` is owned by the broadcaster.
    pub fn snapshot(&self, subscriber_drops: u64) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            headlines_seen: self.headlines_seen.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            classification_failures: self.classification_failures.load(Ordering::Relaxed),
            no_ticker: self.no_ticker.load(Ordering::Relaxed),
            invalid_rejected: self.invalid_rejected.load(Ordering::Relaxed),
            signal_changes: self.signal_changes.load(Ordering::Relaxed),
            fetch_ticks: self.fetch_ticks.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            consecutive_fetch_failures: self.consecutive_fetch_failures.load(Ordering::Relaxed),
            subscriber_drops,
        }
    }
}

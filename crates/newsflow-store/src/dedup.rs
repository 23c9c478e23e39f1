use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use newsflow_models::HeadlineId;

/// Process-wide record of headline ids already aggregated.
///
/// Maps each id to the time it was first recorded. Entries older than the
/// window span can no longer influence any live window, so `sweep` drops them
/// against the pipeline clock; moka's TTL bounds memory against the wall clock
/// as a backstop. Safe for concurrent use from classification workers.
pub struct DedupCache {
    inner: Cache<HeadlineId, DateTime<Utc>>,
    span: chrono::Duration,
}

impl DedupCache {
    pub fn new(max_capacity: u64, span_seconds: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(Duration::from_secs(span_seconds))
                .build(),
            span: chrono::Duration::seconds(span_seconds as i64),
        }
    }

    pub fn seen(&self, id: &HeadlineId) -> bool {
        self.inner.contains_key(id)
    }

    /// Record `id` as seen at `now`. Returns true only for the call that
    /// actually inserted it; repeated calls keep the original timestamp.
    pub async fn record(&self, id: HeadlineId, now: DateTime<Utc>) -> bool {
        self.inner.entry(id).or_insert(now).await.is_fresh()
    }

    pub async fn first_seen(&self, id: &HeadlineId) -> Option<DateTime<Utc>> {
        self.inner.get(id).await
    }

    /// Remove ids first seen at or before `now - span`. Returns how many were removed.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.span;
        let stale: Vec<HeadlineId> = self
            .inner
            .iter()
            .filter(|(_, first_seen)| *first_seen <= cutoff)
            .map(|(id, _)| *id)
            .collect();

        for id in &stale {
            self.inner.invalidate(id).await;
        }
        stale.len()
    }

    pub async fn len(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn record_then_seen() {
        let cache = DedupCache::new(100, 8 * 3600);
        let id = HeadlineId::derive("Apple beats earnings", None);

        assert!(!cache.seen(&id));
        assert!(cache.record(id, t(9)).await);
        assert!(cache.seen(&id));
    }

    #[tokio::test]
    async fn record_is_idempotent() {
        let cache = DedupCache::new(100, 8 * 3600);
        let id = HeadlineId::derive("Apple beats earnings", None);

        assert!(cache.record(id, t(9)).await);
        assert!(!cache.record(id, t(10)).await);
        assert_eq!(cache.first_seen(&id).await, Some(t(9)));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_ids() {
        let cache = DedupCache::new(100, 8 * 3600);
        let old = HeadlineId::derive("Old news", None);
        let fresh = HeadlineId::derive("Fresh news", None);
        cache.record(old, t(1)).await;
        cache.record(fresh, t(6)).await;

        let removed = cache.sweep(t(10)).await;
        assert_eq!(removed, 1);
        assert!(!cache.seen(&old));
        assert!(cache.seen(&fresh));
    }

    #[tokio::test]
    async fn concurrent_records_admit_exactly_one() {
        let cache = std::sync::Arc::new(DedupCache::new(100, 8 * 3600));
        let id = HeadlineId::derive("Tesla deliveries jump", None);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.record(id, t(9)).await }));
        }

        let mut fresh = 0;
        for handle in handles {
            if handle.await.unwrap() {
                fresh += 1;
            }
        }
        assert_eq!(fresh, 1);
    }
}

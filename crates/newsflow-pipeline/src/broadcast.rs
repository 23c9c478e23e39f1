use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use newsflow_models::PipelineEvent;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Fan-out of pipeline events to any number of subscribers.
///
/// Every subscriber reads from its own cursor into a bounded ring of
/// `capacity` events (rounded up to a power of two). `publish` never waits:
/// when a subscriber falls more than `capacity` events behind, the oldest
/// events it has not read are overwritten and it resumes at the oldest one
/// still held (drop-oldest).
/// Skipped events are counted in `dropped_total`. Events published from
/// inside one ticker's critical section reach every subscriber in that order.
pub struct Broadcaster {
    sender: broadcast::Sender<Arc<PipelineEvent>>,
    drops: Arc<AtomicU64>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            drops: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Deliver `event` to current subscribers. Returns how many were reached.
    pub fn publish(&self, event: PipelineEvent) -> usize {
        // Err only means there is nobody listening.
        self.sender.send(Arc::new(event)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription {
        debug!(subscribers = self.sender.receiver_count() + 1, "Subscriber joined");
        Subscription {
            receiver: self.sender.subscribe(),
            dropped: 0,
            drops: self.drops.clone(),
        }
    }

    /// Detach a subscriber. Dropping the `Subscription` has the same effect.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
        debug!(subscribers = self.sender.receiver_count(), "Subscriber left");
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events skipped by lagging subscribers, over all subscribers.
    pub fn dropped_total(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }
}

/// One subscriber's live stream of events.
pub struct Subscription {
    receiver: broadcast::Receiver<Arc<PipelineEvent>>,
    dropped: u64,
    drops: Arc<AtomicU64>,
}

impl Subscription {
    /// Next event, waiting if none is queued. `None` once the broadcaster is gone.
    pub async fn recv(&mut self) -> Option<Arc<PipelineEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => self.lagged(n),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<PipelineEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => self.lagged(n),
                Err(_) => return None,
            }
        }
    }

    /// Events this subscriber lost to lag so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn lagged(&mut self, n: u64) {
        warn!(skipped = n, "Subscriber lagged, oldest events dropped");
        self.dropped += n;
        self.drops.fetch_add(n, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use newsflow_models::{AggregateSummary, SignalState, SignalTransition};

    fn transition(ticker: &str, n: i64) -> PipelineEvent {
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap() + chrono::Duration::seconds(n);
        PipelineEvent::SignalChanged(SignalTransition {
            ticker: ticker.to_string(),
            previous: SignalState::flat(ticker, at),
            current: SignalState::flat(ticker, at),
            summary: AggregateSummary::empty(ticker, at, at),
            headline_id: None,
        })
    }

    fn seconds(event: &PipelineEvent) -> i64 {
        match event {
            PipelineEvent::SignalChanged(t) => t.current.last_updated.timestamp() % 60,
            PipelineEvent::HeadlineProcessed(_) => -1,
        }
    }

    #[tokio::test]
    async fn every_subscriber_gets_every_event_in_order() {
        let broadcaster = Broadcaster::new(16);
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        for n in 0..3 {
            assert_eq!(broadcaster.publish(transition("AAPL", n)), 2);
        }

        for sub in [&mut a, &mut b] {
            for n in 0..3 {
                let event = sub.recv().await.unwrap();
                assert_eq!(seconds(&event), n);
            }
            assert!(sub.try_recv().is_none());
        }
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let broadcaster = Broadcaster::new(4);
        assert_eq!(broadcaster.publish(transition("AAPL", 0)), 0);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn full_queue_drops_oldest() {
        let broadcaster = Broadcaster::new(4);
        let mut slow = broadcaster.subscribe();

        for n in 0..10 {
            broadcaster.publish(transition("AAPL", n));
        }

        let received: Vec<i64> = std::iter::from_fn(|| slow.try_recv())
            .map(|e| seconds(&e))
            .collect();
        assert_eq!(received, vec![6, 7, 8, 9]);
        assert_eq!(slow.dropped(), 6);
        assert_eq!(broadcaster.dropped_total(), 6);
    }

    #[test]
    fn slow_subscriber_does_not_affect_fast_one() {
        let broadcaster = Broadcaster::new(2);
        let _stalled = broadcaster.subscribe();
        let mut fast = broadcaster.subscribe();

        for n in 0..20 {
            broadcaster.publish(transition("TSLA", n));
            let event = fast.try_recv().unwrap();
            assert_eq!(seconds(&event), n);
        }
        assert_eq!(fast.dropped(), 0);
    }

    #[test]
    fn unsubscribe_detaches() {
        let broadcaster = Broadcaster::new(4);
        let a = broadcaster.subscribe();
        let _b = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        broadcaster.unsubscribe(a);
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(broadcaster.publish(transition("AAPL", 0)), 1);
    }

    #[tokio::test]
    async fn recv_ends_when_broadcaster_dropped() {
        let broadcaster = Broadcaster::new(4);
        let mut sub = broadcaster.subscribe();
        drop(broadcaster);
        assert!(sub.recv().await.is_none());
    }
}

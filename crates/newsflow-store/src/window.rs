use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use newsflow_models::{AggregateSummary, HeadlineEvent, HeadlineId, Sentiment};
use rust_decimal::Decimal;

use crate::error::StoreError;

/// One headline's contribution to a ticker window.
#[derive(Debug, Clone)]
pub struct WindowEntry {
    pub event: Arc<HeadlineEvent>,
    /// Sentiment direction scaled by confidence.
    pub weighted: Decimal,
}

/// Rolling, time-ordered buffer of classified headlines for one ticker.
///
/// Entries stay sorted by `published_at`; eviction only ever pops from the
/// old end. An event id appears at most once.
#[derive(Debug)]
pub struct TickerWindow {
    ticker: String,
    span: chrono::Duration,
    entries: VecDeque<WindowEntry>,
    ids: HashSet<HeadlineId>,
    last_insert: Option<DateTime<Utc>>,
}

impl TickerWindow {
    pub fn new(ticker: impl Into<String>, span: chrono::Duration) -> Self {
        Self {
            ticker: ticker.into(),
            span,
            entries: VecDeque::new(),
            ids: HashSet::new(),
            last_insert: None,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &HeadlineId) -> bool {
        self.ids.contains(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &WindowEntry> {
        self.entries.iter()
    }

    /// Insert in `published_at` order. Returns false if the event is already present.
    pub fn insert(&mut self, event: Arc<HeadlineEvent>) -> bool {
        if !self.ids.insert(event.id) {
            return false;
        }

        let published_at = event.published_at;
        let entry = WindowEntry {
            weighted: event.weighted_score(),
            event,
        };

        // Late arrivals from delayed sources go in place; the common case appends.
        match self.entries.back() {
            Some(last) if last.event.published_at > published_at => {
                let idx = self
                    .entries
                    .partition_point(|e| e.event.published_at <= published_at);
                self.entries.insert(idx, entry);
            }
            _ => self.entries.push_back(entry),
        }

        self.last_insert = Some(match self.last_insert {
            Some(prev) if prev > published_at => prev,
            _ => published_at,
        });
        true
    }

    /// Drop every entry published at or before `now - span`.
    pub fn evict_stale(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.span;
        let mut evicted = 0;
        while let Some(front) = self.entries.front() {
            if front.event.published_at > cutoff {
                break;
            }
            if let Some(entry) = self.entries.pop_front() {
                self.ids.remove(&entry.event.id);
                evicted += 1;
            }
        }
        evicted
    }

    /// Evict, then aggregate over entries in `(now - span, now]`.
    ///
    /// Entries dated after `now` stay in the window but are not counted yet.
    pub fn summarize(&mut self, now: DateTime<Utc>) -> AggregateSummary {
        self.evict_stale(now);

        let mut summary = AggregateSummary::empty(&self.ticker, now - self.span, now);
        let mut total = Decimal::ZERO;

        for entry in self.entries.iter().take_while(|e| e.event.published_at <= now) {
            total += entry.weighted;
            summary.headline_count += 1;
            match entry.event.sentiment {
                Sentiment::Positive => summary.positive_count += 1,
                Sentiment::Negative => summary.negative_count += 1,
                Sentiment::Neutral => summary.neutral_count += 1,
            }
        }

        if summary.headline_count > 0 {
            summary.mean_sentiment = total / Decimal::from(summary.headline_count);
        }
        summary
    }

    /// True when the window is empty and has seen no insert newer than `cutoff`.
    fn idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.entries.is_empty() && self.last_insert.map_or(true, |t| t <= cutoff)
    }
}

type Slot = Arc<Mutex<TickerWindow>>;

/// All ticker windows, each behind its own lock.
///
/// Mutation and reads of one ticker are serialized by that ticker's mutex;
/// different tickers never contend beyond the brief map lookup.
pub struct SentimentWindowStore {
    span: chrono::Duration,
    windows: RwLock<HashMap<String, Slot>>,
}

impl SentimentWindowStore {
    pub fn new(span: chrono::Duration) -> Self {
        Self {
            span,
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn span(&self) -> chrono::Duration {
        self.span
    }

    fn existing(&self, ticker: &str) -> Result<Option<Slot>, StoreError> {
        let windows = self
            .windows
            .read()
            .map_err(|e| StoreError::Poisoned(format!("window map: {e}")))?;
        Ok(windows.get(ticker).cloned())
    }

    fn slot(&self, ticker: &str) -> Result<Slot, StoreError> {
        if let Some(slot) = self.existing(ticker)? {
            return Ok(slot);
        }

        let mut windows = self
            .windows
            .write()
            .map_err(|e| StoreError::Poisoned(format!("window map: {e}")))?;
        let slot = windows
            .entry(ticker.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TickerWindow::new(ticker, self.span))));
        Ok(slot.clone())
    }

    /// Run `f` with exclusive access to `ticker`'s window, creating it on first use.
    ///
    /// This is the per-ticker serialization point: callers that must ingest,
    /// summarize and decide as one step do it inside `f`.
    pub fn with_window<R>(
        &self,
        ticker: &str,
        f: impl FnOnce(&mut TickerWindow) -> R,
    ) -> Result<R, StoreError> {
        let slot = self.slot(ticker)?;
        let mut window = slot
            .lock()
            .map_err(|e| StoreError::Poisoned(format!("window {ticker}: {e}")))?;
        Ok(f(&mut window))
    }

    /// Add `event` to `ticker`'s window. Returns false if it was already there.
    pub fn ingest(&self, ticker: &str, event: Arc<HeadlineEvent>) -> Result<bool, StoreError> {
        self.with_window(ticker, |window| window.insert(event))
    }

    /// Summary of `ticker` at `now`. Unknown tickers yield an empty summary.
    pub fn summarize(&self, ticker: &str, now: DateTime<Utc>) -> Result<AggregateSummary, StoreError> {
        match self.existing(ticker)? {
            Some(slot) => {
                let mut window = slot
                    .lock()
                    .map_err(|e| StoreError::Poisoned(format!("window {ticker}: {e}")))?;
                Ok(window.summarize(now))
            }
            None => Ok(AggregateSummary::empty(ticker, now - self.span, now)),
        }
    }

    /// Evict stale entries from every window. Returns the total evicted.
    pub fn evict_stale(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let slots: Vec<(String, Slot)> = {
            let windows = self
                .windows
                .read()
                .map_err(|e| StoreError::Poisoned(format!("window map: {e}")))?;
            windows.iter().map(|(t, s)| (t.clone(), s.clone())).collect()
        };

        let mut evicted = 0;
        for (ticker, slot) in slots {
            let mut window = slot
                .lock()
                .map_err(|e| StoreError::Poisoned(format!("window {ticker}: {e}")))?;
            evicted += window.evict_stale(now);
        }
        Ok(evicted)
    }

    /// Tracked tickers, sorted.
    pub fn tickers(&self) -> Result<Vec<String>, StoreError> {
        let windows = self
            .windows
            .read()
            .map_err(|e| StoreError::Poisoned(format!("window map: {e}")))?;
        let mut tickers: Vec<String> = windows.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }

    /// Drop windows that are empty and received nothing for `idle` before `now`.
    ///
    /// A window currently borrowed through `with_window` is never dropped.
    pub fn prune_idle(
        &self,
        now: DateTime<Utc>,
        idle: chrono::Duration,
    ) -> Result<Vec<String>, StoreError> {
        let cutoff = now - idle;
        let mut windows = self
            .windows
            .write()
            .map_err(|e| StoreError::Poisoned(format!("window map: {e}")))?;

        let mut pruned = Vec::new();
        windows.retain(|ticker, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            let is_idle = match slot.lock() {
                Ok(window) => window.idle_since(cutoff),
                Err(_) => false,
            };
            if is_idle {
                pruned.push(ticker.clone());
            }
            !is_idle
        });
        pruned.sort();
        Ok(pruned)
    }
}

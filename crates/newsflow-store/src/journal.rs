use chrono::{DateTime, SecondsFormat, Utc};
use newsflow_models::SignalTransition;
use rusqlite::Connection;

use crate::error::StoreError;

/// Schema for the signal transition journal.
///
/// `transition_json` holds the full serialized transition; the other columns
/// exist for querying.
pub const JOURNAL_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS signal_transitions (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker          TEXT NOT NULL,
    previous_signal TEXT NOT NULL,
    signal          TEXT NOT NULL,
    confidence      TEXT NOT NULL,
    mean_sentiment  TEXT NOT NULL,
    headline_count  INTEGER NOT NULL,
    headline_id     TEXT,
    decided_at      TEXT NOT NULL,
    transition_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_transitions_ticker ON signal_transitions(ticker);
CREATE INDEX IF NOT EXISTS idx_transitions_decided ON signal_transitions(decided_at);
";

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Append-only SQLite log of signal transitions.
///
/// Kept for inspection while the process runs; nothing is replayed from it
/// at startup.
pub struct SignalJournal {
    conn: Connection,
}

impl SignalJournal {
    /// Open (or create) a journal file in WAL mode.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(JOURNAL_TABLE_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self { conn })
    }

    /// Open an in-memory journal for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(JOURNAL_TABLE_DDL)?;
        Ok(Self { conn })
    }

    pub fn record(&self, transition: &SignalTransition) -> Result<(), StoreError> {
        let json = serde_json::to_string(transition)?;
        self.conn.execute(
            "INSERT INTO signal_transitions \
             (ticker, previous_signal, signal, confidence, mean_sentiment, headline_count, \
              headline_id, decided_at, transition_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                transition.ticker,
                transition.previous.signal.as_str(),
                transition.current.signal.as_str(),
                transition.current.confidence.to_string(),
                transition.summary.mean_sentiment.to_string(),
                transition.summary.headline_count as i64,
                transition.headline_id.map(|id| id.to_string()),
                timestamp(&transition.current.last_updated),
                json,
            ],
        )?;
        Ok(())
    }

    /// The latest `limit` transitions, oldest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<SignalTransition>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT transition_json FROM \
             (SELECT id, transition_json FROM signal_transitions ORDER BY id DESC LIMIT ?1) \
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![limit as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(StoreError::from))
            .collect()
    }

    /// All transitions for one ticker, oldest first.
    pub fn for_ticker(&self, ticker: &str) -> Result<Vec<SignalTransition>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT transition_json FROM signal_transitions WHERE ticker = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![ticker], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(StoreError::from))
            .collect()
    }

    /// Delete transitions decided before `cutoff`. Returns the number of rows deleted.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let deleted = self.conn.execute(
            "DELETE FROM signal_transitions WHERE decided_at < ?1",
            rusqlite::params![timestamp(&cutoff)],
        )?;
        Ok(deleted)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let count: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM signal_transitions",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

use serde::{Deserialize, Serialize};

use crate::headline::{HeadlineEvent, HeadlineId};
use crate::signal::{SignalState, SignalTransition};

/// Event fanned out to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    SignalChanged(SignalTransition),
    HeadlineProcessed(HeadlineProcessed),
}

impl PipelineEvent {
    pub fn ticker(&self) -> Option<&str> {
        match self {
            PipelineEvent::SignalChanged(t) => Some(&t.ticker),
            PipelineEvent::HeadlineProcessed(_) => None,
        }
    }
}

/// A headline made it through classification and aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeadlineProcessed {
    pub event: HeadlineEvent,
    /// Signal of every ticker the headline touched, after aggregation.
    pub signals: Vec<SignalState>,
}

/// What happened to a single submitted or fetched headline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HeadlineOutcome {
    /// Classified and aggregated into at least one ticker window.
    Accepted {
        event: HeadlineEvent,
        signals: Vec<SignalState>,
    },
    /// Classified, but no ticker was found. Recorded, affects no window.
    NoTickers { event: HeadlineEvent },
    /// Already seen; dropped before classification.
    Duplicate { id: HeadlineId },
    /// The classifier failed for this headline ("could not classify").
    Unclassified { id: HeadlineId, reason: String },
}

impl HeadlineOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, HeadlineOutcome::Accepted { .. })
    }

    pub fn id(&self) -> HeadlineId {
        match self {
            HeadlineOutcome::Accepted { event, .. } | HeadlineOutcome::NoTickers { event } => {
                event.id
            }
            HeadlineOutcome::Duplicate { id } | HeadlineOutcome::Unclassified { id, .. } => *id,
        }
    }
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub headlines_seen: u64,
    pub accepted: u64,
    pub duplicates: u64,
    pub classification_failures: u64,
    pub no_ticker: u64,
    pub invalid_rejected: u64,
    pub signal_changes: u64,
    pub fetch_ticks: u64,
    pub fetch_failures: u64,
    pub consecutive_fetch_failures: u64,
    pub subscriber_drops: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemStatus {
    /// Name of the active classifier backend.
    pub classifier: String,
    pub tracked_tickers: Vec<String>,
    pub subscribers: usize,
    pub stats: PipelineStatsSnapshot,
}

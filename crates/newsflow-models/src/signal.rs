use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::headline::HeadlineId;

/// Discrete advisory signal for a ticker.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Long,
    Short,
    #[default]
    Flat,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Long => "LONG",
            Signal::Short => "SHORT",
            Signal::Flat => "FLAT",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current signal for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalState {
    pub ticker: String,
    pub signal: Signal,
    /// 0.0 to 1.0. Always zero while FLAT.
    pub confidence: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl SignalState {
    pub fn flat(ticker: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            ticker: ticker.into(),
            signal: Signal::Flat,
            confidence: Decimal::ZERO,
            last_updated: at,
        }
    }

    /// True when the signal flipped or the confidence moved by more than `epsilon`.
    pub fn differs_from(&self, other: &SignalState, epsilon: Decimal) -> bool {
        self.signal != other.signal || (self.confidence - other.confidence).abs() > epsilon
    }
}

/// Aggregate view of a ticker window at a point in time. Derived on demand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateSummary {
    pub ticker: String,
    /// Confidence-weighted mean in [-1, 1].
    pub mean_sentiment: Decimal,
    pub headline_count: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    pub neutral_count: usize,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

impl AggregateSummary {
    pub fn empty(
        ticker: impl Into<String>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            mean_sentiment: Decimal::ZERO,
            headline_count: 0,
            positive_count: 0,
            negative_count: 0,
            neutral_count: 0,
            window_start,
            window_end,
        }
    }
}

/// A recorded change of a ticker's signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalTransition {
    pub ticker: String,
    pub previous: SignalState,
    pub current: SignalState,
    pub summary: AggregateSummary,
    /// Headline whose arrival caused the change. None for time-driven re-evaluation.
    pub headline_id: Option<HeadlineId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn state(signal: Signal, confidence: Decimal) -> SignalState {
        SignalState {
            ticker: "AAPL".to_string(),
            signal,
            confidence,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn signal_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Signal::Long).unwrap(), r#""LONG""#);
        let parsed: Signal = serde_json::from_str(r#""SHORT""#).unwrap();
        assert_eq!(parsed, Signal::Short);
        assert_eq!(Signal::default(), Signal::Flat);
    }

    #[test]
    fn differs_on_signal_flip() {
        let a = state(Signal::Long, dec!(0.8));
        let b = state(Signal::Short, dec!(0.8));
        assert!(a.differs_from(&b, dec!(0.01)));
    }

    #[test]
    fn confidence_within_epsilon_is_same() {
        let a = state(Signal::Long, dec!(0.800));
        let b = state(Signal::Long, dec!(0.805));
        assert!(!a.differs_from(&b, dec!(0.01)));
        assert!(a.differs_from(&b, dec!(0.001)));
    }

    #[test]
    fn flat_has_zero_confidence() {
        let flat = SignalState::flat("TSLA", Utc::now());
        assert_eq!(flat.signal, Signal::Flat);
        assert_eq!(flat.confidence, Decimal::ZERO);
    }
}

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use newsflow_models::{
    AggregateSummary, HeadlineId, Signal, SignalConfig, SignalState, SignalTransition,
};
use rust_decimal::Decimal;

use crate::error::PipelineError;

/// Derive the next signal for a ticker.
///
/// Pure: the result depends only on the arguments. `last_updated` is taken
/// from `summary.window_end`.
///
/// A ticker already LONG stays LONG while the mean is at or above the hold
/// threshold; a ticker not yet LONG needs the (stricter) entry threshold.
/// SHORT mirrors this. Without configured hold thresholds both pairs are
/// equal and a mean oscillating around the threshold flips the signal on
/// every update; set `hold_positive_threshold` / `hold_negative_threshold`
/// to damp that.
pub fn decide(
    previous: &SignalState,
    summary: &AggregateSummary,
    config: &SignalConfig,
) -> SignalState {
    let at = summary.window_end;
    let flat = SignalState::flat(summary.ticker.clone(), at);

    if summary.headline_count < config.min_headlines {
        return flat;
    }

    let entry = config.entry();
    let hold = config.hold();
    let long_threshold = match previous.signal {
        Signal::Long => hold.positive,
        _ => entry.positive,
    };
    let short_threshold = match previous.signal {
        Signal::Short => hold.negative,
        _ => entry.negative,
    };

    let mean = summary.mean_sentiment;
    if mean >= long_threshold {
        SignalState {
            signal: Signal::Long,
            confidence: mean.clamp(Decimal::ZERO, Decimal::ONE),
            ..flat
        }
    } else if mean <= short_threshold {
        SignalState {
            signal: Signal::Short,
            confidence: (-mean).clamp(Decimal::ZERO, Decimal::ONE),
            ..flat
        }
    } else {
        flat
    }
}

#[derive(Default)]
struct EngineState {
    signals: HashMap<String, SignalState>,
    history: VecDeque<SignalTransition>,
}

/// Owner of the current signal per ticker and the recent transition history.
///
/// `apply` is meant to be called from inside the ticker's window lock so
/// that decisions for one ticker happen in the order their summaries were
/// taken.
pub struct SignalEngine {
    config: SignalConfig,
    history_limit: usize,
    state: Mutex<EngineState>,
}

impl SignalEngine {
    pub fn new(config: SignalConfig, history_limit: usize) -> Self {
        Self {
            config,
            history_limit,
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, EngineState>, PipelineError> {
        self.state
            .lock()
            .map_err(|e| PipelineError::Poisoned(format!("signal engine: {e}")))
    }

    /// Decide from `summary`, store the new state, and return it together
    /// with a transition if it differs from the previous state by more than
    /// the configured confidence epsilon.
    pub fn apply(
        &self,
        summary: &AggregateSummary,
        headline_id: Option<HeadlineId>,
    ) -> Result<(SignalState, Option<SignalTransition>), PipelineError> {
        let mut state = self.lock()?;
        let previous = state
            .signals
            .get(&summary.ticker)
            .cloned()
            .unwrap_or_else(|| SignalState::flat(summary.ticker.clone(), summary.window_start));

        let current = decide(&previous, summary, &self.config);
        state
            .signals
            .insert(summary.ticker.clone(), current.clone());

        if !current.differs_from(&previous, self.config.confidence_epsilon) {
            return Ok((current, None));
        }

        let transition = SignalTransition {
            ticker: summary.ticker.clone(),
            previous,
            current: current.clone(),
            summary: summary.clone(),
            headline_id,
        };
        state.history.push_back(transition.clone());
        while state.history.len() > self.history_limit {
            state.history.pop_front();
        }
        Ok((current, Some(transition)))
    }

    pub fn current(&self, ticker: &str) -> Result<Option<SignalState>, PipelineError> {
        Ok(self.lock()?.signals.get(ticker).cloned())
    }

    pub fn current_signals(&self) -> Result<BTreeMap<String, SignalState>, PipelineError> {
        Ok(self
            .lock()?
            .signals
            .iter()
            .map(|(t, s)| (t.clone(), s.clone()))
            .collect())
    }

    /// Retained transitions, oldest first.
    pub fn history(&self) -> Result<Vec<SignalTransition>, PipelineError> {
        Ok(self.lock()?.history.iter().cloned().collect())
    }

    /// Forget `ticker` if its signal is FLAT. Returns whether it was removed.
    pub fn forget_if_flat(&self, ticker: &str) -> Result<bool, PipelineError> {
        let mut state = self.lock()?;
        match state.signals.get(ticker) {
            Some(s) if s.signal == Signal::Flat => {
                state.signals.remove(ticker);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn summary(mean: Decimal, count: usize) -> AggregateSummary {
        AggregateSummary {
            mean_sentiment: mean,
            headline_count: count,
            ..AggregateSummary::empty("AAPL", at() - Duration::hours(8), at())
        }
    }

    fn state(signal: Signal) -> SignalState {
        SignalState {
            signal,
            ..SignalState::flat("AAPL", at() - Duration::hours(1))
        }
    }

    fn config() -> SignalConfig {
        SignalConfig::default()
    }

    fn hysteresis_config() -> SignalConfig {
        SignalConfig {
            hold_positive_threshold: Some(dec!(0.5)),
            hold_negative_threshold: Some(dec!(-0.5)),
            ..SignalConfig::default()
        }
    }

    #[test]
    fn below_min_headlines_is_flat() {
        let s = decide(&state(Signal::Long), &summary(dec!(0.95), 1), &config());
        assert_eq!(s.signal, Signal::Flat);
        assert_eq!(s.confidence, Decimal::ZERO);
    }

    #[test]
    fn above_positive_threshold_is_long() {
        let s = decide(&state(Signal::Flat), &summary(dec!(0.75), 2), &config());
        assert_eq!(s.signal, Signal::Long);
        assert_eq!(s.confidence, dec!(0.75));
        assert_eq!(s.last_updated, at());
    }

    #[test]
    fn threshold_is_inclusive() {
        let s = decide(&state(Signal::Flat), &summary(dec!(0.7), 2), &config());
        assert_eq!(s.signal, Signal::Long);
        let s = decide(&state(Signal::Flat), &summary(dec!(-0.7), 2), &config());
        assert_eq!(s.signal, Signal::Short);
    }

    #[test]
    fn below_negative_threshold_is_short_with_positive_confidence() {
        let s = decide(&state(Signal::Flat), &summary(dec!(-0.8), 3), &config());
        assert_eq!(s.signal, Signal::Short);
        assert_eq!(s.confidence, dec!(0.8));
    }

    #[test]
    fn middle_is_flat() {
        let s = decide(&state(Signal::Flat), &summary(dec!(0.1), 5), &config());
        assert_eq!(s.signal, Signal::Flat);
        assert_eq!(s.confidence, Decimal::ZERO);
    }

    #[test]
    fn without_hold_pair_signal_flaps() {
        let s = decide(&state(Signal::Long), &summary(dec!(0.69), 2), &config());
        assert_eq!(s.signal, Signal::Flat);
    }

    #[test]
    fn hold_threshold_keeps_long() {
        let s = decide(&state(Signal::Long), &summary(dec!(0.6), 2), &hysteresis_config());
        assert_eq!(s.signal, Signal::Long);
        assert_eq!(s.confidence, dec!(0.6));

        let s = decide(&state(Signal::Long), &summary(dec!(0.4), 2), &hysteresis_config());
        assert_eq!(s.signal, Signal::Flat);
    }

    #[test]
    fn hold_threshold_does_not_apply_on_entry() {
        let s = decide(&state(Signal::Flat), &summary(dec!(0.6), 2), &hysteresis_config());
        assert_eq!(s.signal, Signal::Flat);
        let s = decide(&state(Signal::Flat), &summary(dec!(-0.6), 2), &hysteresis_config());
        assert_eq!(s.signal, Signal::Flat);
    }

    #[test]
    fn hold_threshold_keeps_short() {
        let s = decide(&state(Signal::Short), &summary(dec!(-0.55), 2), &hysteresis_config());
        assert_eq!(s.signal, Signal::Short);
    }

    #[test]
    fn hold_does_not_bypass_min_headlines() {
        let s = decide(&state(Signal::Long), &summary(dec!(0.9), 1), &hysteresis_config());
        assert_eq!(s.signal, Signal::Flat);
    }

    #[test]
    fn decide_is_deterministic() {
        let prev = state(Signal::Flat);
        let sum = summary(dec!(0.72), 4);
        let cfg = hysteresis_config();
        assert_eq!(decide(&prev, &sum, &cfg), decide(&prev, &sum, &cfg));
    }

    #[test]
    fn engine_reports_only_changes() {
        let engine = SignalEngine::new(config(), 100);

        let (s, t) = engine.apply(&summary(dec!(0.9), 1), None).unwrap();
        assert_eq!(s.signal, Signal::Flat);
        assert!(t.is_none());

        let (s, t) = engine.apply(&summary(dec!(0.8), 2), None).unwrap();
        assert_eq!(s.signal, Signal::Long);
        let t = t.unwrap();
        assert_eq!(t.previous.signal, Signal::Flat);
        assert_eq!(t.current.signal, Signal::Long);

        let (_, t) = engine.apply(&summary(dec!(0.8), 3), None).unwrap();
        assert!(t.is_none(), "same confidence is not a change");

        let (_, t) = engine.apply(&summary(dec!(0.85), 3), None).unwrap();
        assert!(t.is_some(), "confidence move beyond epsilon is a change");

        assert_eq!(engine.history().unwrap().len(), 2);
        assert_eq!(
            engine.current("AAPL").unwrap().unwrap().confidence,
            dec!(0.85)
        );
    }

    #[test]
    fn history_is_capped_oldest_first() {
        let engine = SignalEngine::new(config(), 3);
        for i in 0..5 {
            let mean = if i % 2 == 0 { dec!(0.9) } else { dec!(0) };
            engine.apply(&summary(mean, 2), None).unwrap();
        }
        let history = engine.history().unwrap();
        assert_eq!(history.len(), 3);
        // Transitions were LONG, FLAT, LONG, FLAT, LONG; the first two are gone.
        assert_eq!(history[0].current.signal, Signal::Long);
        assert_eq!(history[1].current.signal, Signal::Flat);
        assert_eq!(history[2].current.signal, Signal::Long);
    }

    #[test]
    fn forget_only_flat() {
        let engine = SignalEngine::new(config(), 10);
        engine.apply(&summary(dec!(0.9), 2), None).unwrap();
        assert!(!engine.forget_if_flat("AAPL").unwrap());

        engine.apply(&summary(dec!(0), 0), None).unwrap();
        assert!(engine.forget_if_flat("AAPL").unwrap());
        assert!(engine.current_signals().unwrap().is_empty());
    }
}

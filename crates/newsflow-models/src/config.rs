use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for every configured duration: ten years.
pub const MAX_DURATION_SECONDS: u64 = 10 * 366 * 24 * 60 * 60;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid threshold: {0}")]
    Threshold(String),

    #[error("Invalid hysteresis: {0}")]
    Hysteresis(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration. Loaded once at startup, validated, then shared
/// read-only with every component.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewsflowConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

impl NewsflowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.signal.validate()?;
        self.classifier.validate()?;
        self.source.validate()?;
        self.journal.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Rolling window length per ticker.
    #[serde(default = "default_window_span")]
    pub window_span_seconds: u64,
    /// Interval between news source polls.
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_seconds: u64,
    /// Articles requested per fetch tick.
    #[serde(default = "default_fetch_batch_size")]
    pub fetch_batch_size: usize,
    /// Upper bound on concurrent classifier calls within a tick.
    #[serde(default = "default_classify_workers")]
    pub classify_workers: usize,
    #[serde(default = "default_classify_timeout")]
    pub classify_timeout_seconds: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,
    /// Interval between dedup sweeps / window eviction passes.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    /// Manually submitted headlines shorter than this are rejected.
    #[serde(default = "default_min_headline_chars")]
    pub min_headline_chars: usize,
    /// Signal transitions kept in memory.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Events buffered per subscriber before the oldest are dropped.
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_queue_capacity: usize,
    #[serde(default = "default_dedup_capacity")]
    pub dedup_max_capacity: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_span_seconds: default_window_span(),
            fetch_interval_seconds: default_fetch_interval(),
            fetch_batch_size: default_fetch_batch_size(),
            classify_workers: default_classify_workers(),
            classify_timeout_seconds: default_classify_timeout(),
            fetch_timeout_seconds: default_fetch_timeout(),
            cleanup_interval_seconds: default_cleanup_interval(),
            min_headline_chars: default_min_headline_chars(),
            history_limit: default_history_limit(),
            subscriber_queue_capacity: default_subscriber_capacity(),
            dedup_max_capacity: default_dedup_capacity(),
        }
    }
}

impl PipelineConfig {
    pub fn window_span(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_span_seconds.min(MAX_DURATION_SECONDS) as i64)
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_seconds)
    }

    pub fn classify_timeout(&self) -> Duration {
        Duration::from_secs(self.classify_timeout_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("window_span_seconds", self.window_span_seconds),
            ("fetch_interval_seconds", self.fetch_interval_seconds),
            ("classify_timeout_seconds", self.classify_timeout_seconds),
            ("fetch_timeout_seconds", self.fetch_timeout_seconds),
            ("cleanup_interval_seconds", self.cleanup_interval_seconds),
            ("fetch_batch_size", self.fetch_batch_size as u64),
            ("classify_workers", self.classify_workers as u64),
            ("subscriber_queue_capacity", self.subscriber_queue_capacity as u64),
            ("dedup_max_capacity", self.dedup_max_capacity),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
            }
        }

        let durations = [
            ("window_span_seconds", self.window_span_seconds),
            ("fetch_interval_seconds", self.fetch_interval_seconds),
            ("classify_timeout_seconds", self.classify_timeout_seconds),
            ("fetch_timeout_seconds", self.fetch_timeout_seconds),
            ("cleanup_interval_seconds", self.cleanup_interval_seconds),
        ];
        for (name, value) in durations {
            if value > MAX_DURATION_SECONDS {
                return Err(ConfigError::Invalid(format!(
                    "{name} = {value} exceeds the maximum of {MAX_DURATION_SECONDS}"
                )));
            }
        }
        Ok(())
    }
}

/// A positive/negative threshold pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub positive: Decimal,
    pub negative: Decimal,
}

/// Decision thresholds.
///
/// `positive_threshold` / `negative_threshold` are the entry thresholds. The
/// optional hold thresholds let an active LONG/SHORT persist until sentiment
/// falls back past a weaker bound. Without them entry and hold are identical,
/// and a ticker whose sentiment hovers at the boundary will flap between
/// states on every update. Tune the hold pair to trade responsiveness for
/// stability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalConfig {
    #[serde(default = "default_min_headlines")]
    pub min_headlines: usize,
    #[serde(default = "default_positive_threshold")]
    pub positive_threshold: Decimal,
    #[serde(default = "default_negative_threshold")]
    pub negative_threshold: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_positive_threshold: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_negative_threshold: Option<Decimal>,
    /// Confidence moves at or below this are not reported as changes.
    #[serde(default = "default_confidence_epsilon")]
    pub confidence_epsilon: Decimal,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_headlines: default_min_headlines(),
            positive_threshold: default_positive_threshold(),
            negative_threshold: default_negative_threshold(),
            hold_positive_threshold: None,
            hold_negative_threshold: None,
            confidence_epsilon: default_confidence_epsilon(),
        }
    }
}

impl SignalConfig {
    pub fn entry(&self) -> Thresholds {
        Thresholds {
            positive: self.positive_threshold,
            negative: self.negative_threshold,
        }
    }

    pub fn hold(&self) -> Thresholds {
        Thresholds {
            positive: self
                .hold_positive_threshold
                .unwrap_or(self.positive_threshold),
            negative: self
                .hold_negative_threshold
                .unwrap_or(self.negative_threshold),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_headlines == 0 {
            return Err(ConfigError::Invalid(
                "min_headlines must be at least 1".to_string(),
            ));
        }
        if self.positive_threshold <= Decimal::ZERO || self.positive_threshold > Decimal::ONE {
            return Err(ConfigError::Threshold(format!(
                "positive_threshold {} must be in (0, 1]",
                self.positive_threshold
            )));
        }
        if self.negative_threshold >= Decimal::ZERO
            || self.negative_threshold < Decimal::NEGATIVE_ONE
        {
            return Err(ConfigError::Threshold(format!(
                "negative_threshold {} must be in [-1, 0)",
                self.negative_threshold
            )));
        }
        if let Some(hold) = self.hold_positive_threshold {
            if hold < Decimal::ZERO || hold >= self.positive_threshold {
                return Err(ConfigError::Hysteresis(format!(
                    "hold_positive_threshold {hold} must be in [0, {})",
                    self.positive_threshold
                )));
            }
        }
        if let Some(hold) = self.hold_negative_threshold {
            if hold > Decimal::ZERO || hold <= self.negative_threshold {
                return Err(ConfigError::Hysteresis(format!(
                    "hold_negative_threshold {hold} must be in ({}, 0]",
                    self.negative_threshold
                )));
            }
        }
        if self.confidence_epsilon < Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "confidence_epsilon must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which classifier backend serves the classification port.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierBackend {
    #[default]
    Keyword,
    Command,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub backend: ClassifierBackend,
    /// Program to run for the `command` backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Arguments passed before the headline text.
    #[serde(default)]
    pub args: Vec<String>,
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == ClassifierBackend::Command
            && self.command.as_deref().map_or(true, |c| c.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "classifier.command is required for the command backend".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// No automatic fetching; manual submission only.
    #[default]
    None,
    Simulated,
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    /// JSON-lines article file for the `file` source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// RNG seed for the simulated source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kind == SourceKind::File && self.path.is_none() {
            return Err(ConfigError::Invalid(
                "source.path is required for the file source".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_journal_path")]
    pub sqlite_path: String,
    /// Transitions older than this are pruned by the cleanup loop.
    #[serde(default = "default_journal_retention")]
    pub retention_hours: u64,
}

impl JournalConfig {
    /// Age after which journal rows are pruned.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours((self.retention_hours.min(MAX_DURATION_SECONDS / 3600)) as i64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_hours == 0 || self.retention_hours > MAX_DURATION_SECONDS / 3600 {
            return Err(ConfigError::Invalid(format!(
                "journal.retention_hours = {} must be in [1, {}]",
                self.retention_hours,
                MAX_DURATION_SECONDS / 3600
            )));
        }
        if self.enabled && self.sqlite_path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "journal.sqlite_path is required when the journal is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sqlite_path: default_journal_path(),
            retention_hours: default_journal_retention(),
        }
    }
}

fn default_window_span() -> u64 {
    8 * 60 * 60
}
fn default_fetch_interval() -> u64 {
    600
}
fn default_fetch_batch_size() -> usize {
    50
}
fn default_classify_workers() -> usize {
    4
}
fn default_classify_timeout() -> u64 {
    10
}
fn default_fetch_timeout() -> u64 {
    30
}
fn default_cleanup_interval() -> u64 {
    300
}
fn default_min_headline_chars() -> usize {
    5
}
fn default_history_limit() -> usize {
    100
}
fn default_subscriber_capacity() -> usize {
    256
}
fn default_dedup_capacity() -> u64 {
    100_000
}
fn default_min_headlines() -> usize {
    2
}
fn default_positive_threshold() -> Decimal {
    Decimal::new(7, 1)
}
fn default_negative_threshold() -> Decimal {
    Decimal::new(-7, 1)
}
fn default_confidence_epsilon() -> Decimal {
    Decimal::new(1, 4)
}
fn default_journal_path() -> String {
    "data/newsflow_journal.db".to_string()
}
fn default_journal_retention() -> u64 {
    24 * 7
}

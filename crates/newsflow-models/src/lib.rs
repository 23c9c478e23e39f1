pub mod config;
pub mod event;
pub mod headline;
pub mod signal;

pub use config::{
    ClassifierBackend, ClassifierConfig, ConfigError, JournalConfig, NewsflowConfig,
    PipelineConfig, SignalConfig, SourceConfig, SourceKind, Thresholds, MAX_DURATION_SECONDS,
};
pub use event::{
    HeadlineOutcome, HeadlineProcessed, PipelineEvent, PipelineStatsSnapshot, SystemStatus,
};
pub use headline::{
    normalize_text, Classification, FetchMetadata, FetchedBatch, HeadlineEvent, HeadlineId,
    RawArticle, Sentiment,
};
pub use signal::{AggregateSummary, Signal, SignalState, SignalTransition};

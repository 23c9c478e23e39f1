use std::time::Duration;

use newsflow_models::ConfigError;
use newsflow_store::StoreError;
use thiserror::Error;

/// Transport-level failure of a news source. "No more results" is never an error.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("News source unavailable: {0}")]
    Unavailable(String),

    #[error("News source timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid headline: {0}")]
    InvalidHeadline(String),

    #[error("Source fetch failed: {0}")]
    SourceFetchFailed(#[from] SourceError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lock poisoned: {0}")]
    Poisoned(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Classification unavailable: {0}")]
    Unavailable(String),

    #[error("Classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("Classifier response parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

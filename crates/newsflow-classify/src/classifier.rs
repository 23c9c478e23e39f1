use async_trait::async_trait;
use newsflow_models::Classification;
use rust_decimal::Decimal;

use crate::error::ClassifyError;

/// The classification port: headline text in, sentiment + confidence +
/// tickers out. The pipeline depends only on this contract, never on the
/// backend behind it.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Backend name, reported in system status.
    fn name(&self) -> &str;

    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError>;
}

/// Reject classifications that break the contract (confidence outside [0, 1]).
pub fn check_contract(classification: Classification) -> Result<Classification, ClassifyError> {
    if classification.confidence < Decimal::ZERO || classification.confidence > Decimal::ONE {
        return Err(ClassifyError::Parse(format!(
            "confidence {} outside [0, 1]",
            classification.confidence
        )));
    }
    Ok(classification)
}

pub mod file;
pub mod fixed;
pub mod simulated;

pub use file::FileSource;
pub use fixed::StaticSource;
pub use simulated::SimulatedSource;

use async_trait::async_trait;
use newsflow_models::FetchedBatch;

use crate::error::SourceError;

/// A provider of raw articles, polled once per fetch tick.
///
/// Implementations return at most `target` articles and may return fewer
/// (including none) when results run out; only transport failures are errors.
#[async_trait]
pub trait NewsSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_batch(&self, target: usize) -> Result<FetchedBatch, SourceError>;
}

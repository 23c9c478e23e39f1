use std::sync::Mutex;

use async_trait::async_trait;
use newsflow_models::{FetchMetadata, FetchedBatch, RawArticle};

use super::NewsSource;
use crate::error::SourceError;

/// Serves a fixed list of articles page by page, then runs dry.
pub struct StaticSource {
    articles: Vec<RawArticle>,
    cursor: Mutex<usize>,
}

impl StaticSource {
    pub fn new(articles: Vec<RawArticle>) -> Self {
        Self {
            articles,
            cursor: Mutex::new(0),
        }
    }

    pub fn from_headlines<I, S>(headlines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(headlines.into_iter().map(RawArticle::headline).collect())
    }

    /// Start serving from the beginning again.
    pub fn rewind(&self) {
        *self.cursor.lock().unwrap_or_else(|e| e.into_inner()) = 0;
    }
}

#[async_trait]
impl NewsSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_batch(&self, target: usize) -> Result<FetchedBatch, SourceError> {
        let mut cursor = self
            .cursor
            .lock()
            .map_err(|e| SourceError::Unavailable(format!("cursor lock poisoned: {e}")))?;
        let start = (*cursor).min(self.articles.len());
        let end = (start + target).min(self.articles.len());
        *cursor = end;

        let articles = self.articles[start..end].to_vec();
        Ok(FetchedBatch {
            metadata: FetchMetadata {
                pages_fetched: u32::from(!articles.is_empty()),
                total_raw: articles.len(),
                filtered_count: articles.len(),
            },
            articles,
        })
    }
}

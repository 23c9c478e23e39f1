use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use newsflow_models::{FetchMetadata, FetchedBatch, RawArticle};
use tracing::{info, warn};

use super::NewsSource;
use crate::error::SourceError;

/// Tails a JSON-lines file of [`RawArticle`]s.
///
/// Each fetch returns the next `target` articles after the last line already
/// consumed, so lines appended between ticks are picked up and nothing is
/// skipped. If the file shrinks below the cursor it is treated as replaced
/// and read from the start. Blank lines are ignored; malformed lines are
/// logged and consumed.
pub struct FileSource {
    path: PathBuf,
    /// Non-blank lines already consumed.
    cursor: Mutex<usize>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cursor: Mutex::new(0),
        }
    }
}

#[async_trait]
impl NewsSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch_batch(&self, target: usize) -> Result<FetchedBatch, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let lines: Vec<(usize, &str)> = content
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx, line.trim()))
            .filter(|(_, line)| !line.is_empty())
            .collect();

        let mut cursor = self
            .cursor
            .lock()
            .map_err(|e| SourceError::Unavailable(format!("cursor lock poisoned: {e}")))?;
        if *cursor > lines.len() {
            info!(path = %self.path.display(), "Article file shrank, reading from the start");
            *cursor = 0;
        }

        let mut articles = Vec::new();
        let mut total_raw = 0;
        for (idx, line) in &lines[*cursor..] {
            if articles.len() >= target {
                break;
            }
            total_raw += 1;
            match serde_json::from_str::<RawArticle>(line) {
                Ok(article) if !article.text.trim().is_empty() => articles.push(article),
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %self.path.display(), line = idx + 1, error = %e, "Skipping malformed article");
                }
            }
        }
        *cursor += total_raw;

        let filtered_count = articles.len();
        Ok(FetchedBatch {
            articles,
            metadata: FetchMetadata {
                pages_fetched: u32::from(total_raw > 0),
                total_raw,
                filtered_count,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;

    #[tokio::test]
    async fn reads_json_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"text": "Apple beats earnings", "source": "wire"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file, r#"{{"text": "  "}}"#).unwrap();
        writeln!(
            file,
            r#"{{"text": "Tesla recalls cars", "url": "https://example.com/t", "published_at": "2025-03-10T09:00:00Z"}}"#
        )
        .unwrap();

        let source = FileSource::new(file.path());
        let batch = source.fetch_batch(10).await.unwrap();
        assert_eq!(batch.articles.len(), 2);
        assert_eq!(batch.metadata.total_raw, 4);
        assert_eq!(batch.metadata.filtered_count, 2);
        assert_eq!(batch.articles[0].source.as_deref(), Some("wire"));
        assert!(batch.articles[1].published_at.is_some());

        let batch = source.fetch_batch(10).await.unwrap();
        assert!(batch.articles.is_empty());
        assert_eq!(batch.metadata.pages_fetched, 0);
    }

    #[tokio::test]
    async fn small_batches_cover_whole_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for n in 0..5 {
            writeln!(file, r#"{{"text": "Headline number {n}"}}"#).unwrap();
        }

        let source = FileSource::new(file.path());
        let mut seen = HashSet::new();
        let mut sizes = Vec::new();
        for _ in 0..4 {
            let batch = source.fetch_batch(2).await.unwrap();
            sizes.push(batch.articles.len());
            seen.extend(batch.articles.into_iter().map(|a| a.text));
        }

        assert_eq!(sizes, vec![2, 2, 1, 0]);
        assert_eq!(seen.len(), 5);
        assert!(seen.contains("Headline number 4"));
    }

    #[tokio::test]
    async fn appended_lines_are_picked_up() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"text": "Nvidia beats estimates"}}"#).unwrap();

        let source = FileSource::new(file.path());
        assert_eq!(source.fetch_batch(10).await.unwrap().articles.len(), 1);

        writeln!(file, r#"{{"text": "Intel cuts guidance"}}"#).unwrap();
        file.flush().unwrap();
        let batch = source.fetch_batch(10).await.unwrap();
        assert_eq!(batch.articles.len(), 1);
        assert_eq!(batch.articles[0].text, "Intel cuts guidance");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let source = FileSource::new("/nonexistent/newsflow/articles.jsonl");
        assert!(matches!(
            source.fetch_batch(5).await,
            Err(SourceError::Io(_))
        ));
    }
}

use std::path::Path;
use std::sync::Arc;

use newsflow_classify::{Classifier, CommandClassifier, CommandConfig, KeywordClassifier};
use newsflow_models::{
    ClassifierBackend, ConfigError, JournalConfig, NewsflowConfig, SourceConfig, SourceKind,
};
use newsflow_store::SignalJournal;

use crate::coordinator::Coordinator;
use crate::error::PipelineError;
use crate::sources::{FileSource, NewsSource, SimulatedSource};

/// Classifier backend selected by `[classifier]`.
pub fn build_classifier(config: &NewsflowConfig) -> Result<Arc<dyn Classifier>, PipelineError> {
    let classifier: Arc<dyn Classifier> = match config.classifier.backend {
        ClassifierBackend::Keyword => Arc::new(KeywordClassifier::default()),
        ClassifierBackend::Command => {
            let program = config.classifier.command.clone().ok_or_else(|| {
                ConfigError::Invalid("classifier.command is required for the command backend".to_string())
            })?;
            Arc::new(CommandClassifier::new(
                CommandConfig::new(program)
                    .with_args(config.classifier.args.iter().cloned())
                    .with_timeout(config.pipeline.classify_timeout()),
            ))
        }
    };
    Ok(classifier)
}

/// News source selected by `[source]`, or `None` for manual submission only.
pub fn build_source(config: &SourceConfig) -> Result<Option<Arc<dyn NewsSource>>, PipelineError> {
    let source: Arc<dyn NewsSource> = match config.kind {
        SourceKind::None => return Ok(None),
        SourceKind::Simulated => Arc::new(SimulatedSource::new(config.seed)),
        SourceKind::File => {
            let path = config.path.clone().ok_or_else(|| {
                ConfigError::Invalid("source.path is required for the file source".to_string())
            })?;
            Arc::new(FileSource::new(path))
        }
    };
    Ok(Some(source))
}

/// Coordinator with the configured classifier and the system clock.
pub fn build_coordinator(config: NewsflowConfig) -> Result<Arc<Coordinator>, PipelineError> {
    let classifier = build_classifier(&config)?;
    Ok(Arc::new(Coordinator::new(config, classifier)?))
}

/// Open the transition journal if `[journal] enabled`, creating its directory.
pub fn open_journal(config: &JournalConfig) -> Result<Option<SignalJournal>, PipelineError> {
    if !config.enabled {
        return Ok(None);
    }
    if let Some(parent) = Path::new(&config.sqlite_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(Some(SignalJournal::open(&config.sqlite_path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_keyword_pipeline() {
        let config = NewsflowConfig::default();
        assert_eq!(build_classifier(&config).unwrap().name(), "keyword");
        assert!(build_source(&config.source).unwrap().is_none());
        assert!(open_journal(&config.journal).unwrap().is_none());

        let coordinator = build_coordinator(config).unwrap();
        assert_eq!(coordinator.status().unwrap().classifier, "keyword");
    }

    #[test]
    fn command_backend() {
        let mut config = NewsflowConfig::default();
        config.classifier.backend = ClassifierBackend::Command;
        config.classifier.command = Some("python3".to_string());
        assert_eq!(build_classifier(&config).unwrap().name(), "command");

        config.classifier.command = None;
        assert!(matches!(
            build_classifier(&config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn sources() {
        let simulated = SourceConfig {
            kind: SourceKind::Simulated,
            ..SourceConfig::default()
        };
        assert_eq!(build_source(&simulated).unwrap().unwrap().name(), "simulated");

        let file = SourceConfig {
            kind: SourceKind::File,
            path: Some("articles.jsonl".to_string()),
            ..SourceConfig::default()
        };
        assert_eq!(build_source(&file).unwrap().unwrap().name(), "file");
    }

    #[test]
    fn journal_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("journal.db");
        let config = JournalConfig {
            enabled: true,
            sqlite_path: path.to_string_lossy().to_string(),
            ..JournalConfig::default()
        };
        let journal = open_journal(&config).unwrap().unwrap();
        assert_eq!(journal.count().unwrap(), 0);
        assert!(path.exists());
    }
}

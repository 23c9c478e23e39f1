use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use newsflow_models::Classification;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::classifier::{check_contract, Classifier};
use crate::error::ClassifyError;
use crate::parser::parse_classification;

/// Configuration for an external classifier process.
#[derive(Debug, Clone)]
pub struct CommandConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Classifier backed by an external program.
///
/// The headline is passed as the final argument. The program must print a
/// JSON object `{"sentiment": ..., "confidence": ..., "tickers": [...]}` on
/// stdout; surrounding text and markdown fences are tolerated.
pub struct CommandClassifier {
    config: CommandConfig,
}

impl CommandClassifier {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }

    async fn invoke(&self, text: &str) -> Result<String, ClassifyError> {
        debug!(program = %self.config.program, "Invoking classifier command");

        let output = tokio::time::timeout(self.config.timeout, async {
            Command::new(&self.config.program)
                .args(&self.config.args)
                .arg(text)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await
        })
        .await
        .map_err(|_| ClassifyError::Timeout(self.config.timeout))?
        .map_err(|e| {
            ClassifyError::Unavailable(format!("Failed to spawn {}: {e}", self.config.program))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr, "Classifier command failed");
            return Err(ClassifyError::Unavailable(format!(
                "{} exited {}: {}",
                self.config.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if stdout.trim().is_empty() {
            return Err(ClassifyError::Unavailable(format!(
                "{} returned empty output",
                self.config.program
            )));
        }

        Ok(stdout)
    }
}

#[async_trait]
impl Classifier for CommandClassifier {
    fn name(&self) -> &str {
        "command"
    }

    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        let stdout = self.invoke(text).await?;
        check_contract(parse_classification(&stdout)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = CommandConfig::new("python3")
            .with_args(["classify.py", "--json"])
            .with_timeout(Duration::from_secs(3));
        assert_eq!(config.program, "python3");
        assert_eq!(config.args, vec!["classify.py", "--json"]);
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn default_timeout() {
        assert_eq!(CommandConfig::new("x").timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let classifier =
            CommandClassifier::new(CommandConfig::new("newsflow-no-such-classifier-binary"));
        let err = classifier.classify("Apple beats earnings").await;
        assert!(matches!(err, Err(ClassifyError::Unavailable(_))));
    }
}

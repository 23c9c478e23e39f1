use std::path::Path;

use newsflow_models::{ConfigError, NewsflowConfig};

use crate::error::PipelineError;

/// Parse and validate a TOML configuration string.
pub fn parse_config(toml_str: &str) -> Result<NewsflowConfig, PipelineError> {
    let config: NewsflowConfig = toml::from_str(toml_str)
        .map_err(|e| ConfigError::Invalid(format!("failed to parse config: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Read, parse and validate a TOML configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<NewsflowConfig, PipelineError> {
    let toml_str = std::fs::read_to_string(path)?;
    parse_config(&toml_str)
}

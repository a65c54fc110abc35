//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::RecyclerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<RecyclerConfig, ConfigError> {
    let config: RecyclerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    let latency = &config.latency;
    if latency.closing_streak == 0 || latency.closing_count == 0 {
        tracing::warn!(
            closing_streak = latency.closing_streak,
            closing_count = latency.closing_count,
            "A zero closing limit ends every Closing period on the sample that started it"
        );
    }

    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RecyclerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

//! Configuration loading for the kvtrace CLI.
//!
//! The file path comes from `--config <path>` or `KVTRACE_CONFIG`, both
//! resolved by the argument parser. Every section is required; there are no
//! silent defaults.

use kvtrace_core::KvTraceConfig;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "KVTRACE_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or KVTRACE_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] kvtrace_core::ConfigError),
}

/// Load and validate the config from `path`.
pub fn load(path: Option<PathBuf>) -> Result<KvTraceConfig, ConfigError> {
    let path = path.ok_or(ConfigError::MissingConfigPath)?;
    let config = from_path(&path)?;
    config.validate()?;
    Ok(config)
}

pub fn from_path(path: &Path) -> Result<KvTraceConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    from_toml_str(&contents)
}

pub fn from_toml_str(contents: &str) -> Result<KvTraceConfig, ConfigError> {
    let config: KvTraceConfig = toml::from_str(contents)?;
    Ok(config)
}

//! Error types for the CLI.

use crate::config::ConfigError;
use kvtrace_core::KvTraceError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    KvTrace(#[from] KvTraceError),
    #[error("{0}")]
    Logging(String),
}

impl From<kvtrace_core::ConfigError> for CliError {
    fn from(e: kvtrace_core::ConfigError) -> Self {
        CliError::KvTrace(e.into())
    }
}

impl From<kvtrace_core::StoreError> for CliError {
    fn from(e: kvtrace_core::StoreError) -> Self {
        CliError::KvTrace(e.into())
    }
}

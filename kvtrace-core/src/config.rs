//! Configuration types

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default lifetime of a resource access counter.
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 10;

/// Longest accepted access counter window (one year).
pub const MAX_ACCESS_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Which key-value store backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store, lost on exit
    Memory,
    /// LMDB environment on disk, shared between processes
    Lmdb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// LMDB directory. Required for the lmdb backend.
    pub path: Option<PathBuf>,
    pub map_size_mb: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    pub access_ttl_secs: u64,
    pub request_timeout_ms: u64,
    pub user_agent: String,
}

impl FetchConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
    pub json: bool,
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KvTraceConfig {
    pub store: StoreConfig,
    pub fetch: FetchConfig,
    pub logging: LoggingConfig,
}

impl KvTraceConfig {
    /// In-memory store with the stock fetch settings.
    pub fn local_defaults() -> Self {
        Self {
            store: StoreConfig {
                backend: StoreBackend::Memory,
                path: None,
                map_size_mb: 64,
            },
            fetch: FetchConfig {
                access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
                request_timeout_ms: 30_000,
                user_agent: format!("kvtrace/{}", env!("CARGO_PKG_VERSION")),
            },
            logging: LoggingConfig {
                filter: "kvtrace=info".to_string(),
                json: false,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.backend == StoreBackend::Lmdb {
            match &self.store.path {
                None => {
                    return Err(ConfigError::MissingRequired {
                        field: "store.path".to_string(),
                    })
                }
                Some(path) if path.as_os_str().is_empty() => {
                    return Err(ConfigError::InvalidValue {
                        field: "store.path".to_string(),
                        value: String::new(),
                        reason: "must not be empty".to_string(),
                    })
                }
                Some(_) => {}
            }
        }
        if self.store.map_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.map_size_mb".to_string(),
                value: self.store.map_size_mb.to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.fetch.access_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch.access_ttl_secs".to_string(),
                value: self.fetch.access_ttl_secs.to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.fetch.access_ttl_secs > MAX_ACCESS_TTL_SECS {
            return Err(ConfigError::InvalidValue {
                field: "fetch.access_ttl_secs".to_string(),
                value: self.fetch.access_ttl_secs.to_string(),
                reason: format!("must be <= {}", MAX_ACCESS_TTL_SECS),
            });
        }
        if self.fetch.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch.request_timeout_ms".to_string(),
                value: self.fetch.request_timeout_ms.to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.fetch.user_agent.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "fetch.user_agent".to_string(),
                value: self.fetch.user_agent.clone(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "logging.filter".to_string(),
                value: self.logging.filter.clone(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

//! Error types for kvtrace operations

use thiserror::Error;

/// Key-value store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Transaction failed: {reason}")]
    Transaction { reason: String },

    #[error("Wrong type for key {key}: expected {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("Value at key {key} is not an integer")]
    NotAnInteger { key: String },

    #[error("Corrupt record at key {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Expiry out of range for key {key}")]
    ExpiryOutOfRange { key: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Failures of a caller-supplied conversion applied to stored bytes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Invalid UTF-8: {reason}")]
    InvalidUtf8 { reason: String },

    #[error("Invalid integer: {value}")]
    InvalidInteger { value: String },

    #[error("Invalid float: {value}")]
    InvalidFloat { value: String },

    #[error("Conversion failed: {reason}")]
    Custom { reason: String },
}

/// Network fetch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid body from {url}: {reason}")]
    InvalidBody { url: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all kvtrace errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvTraceError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for kvtrace operations.
pub type KvTraceResult<T> = Result<T, KvTraceError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_wrong_type() {
        let err = StoreError::WrongType {
            key: "Cache.store:inputs".to_string(),
            expected: "integer",
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Wrong type"));
        assert!(msg.contains("Cache.store:inputs"));
        assert!(msg.contains("integer"));
    }

    #[test]
    fn test_store_error_display_unavailable() {
        let err = StoreError::Unavailable {
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "Store unavailable: connection refused");
    }

    #[test]
    fn test_conversion_error_display_invalid_integer() {
        let err = ConversionError::InvalidInteger {
            value: "12a".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid integer"));
        assert!(msg.contains("12a"));
    }

    #[test]
    fn test_fetch_error_display_status() {
        let err = FetchError::Status {
            url: "http://example.com".to_string(),
            status: 503,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("http://example.com"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "fetch.access_ttl_secs".to_string(),
            value: "0".to_string(),
            reason: "must be > 0".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("fetch.access_ttl_secs"));
        assert!(msg.contains("must be > 0"));
    }

    #[test]
    fn test_kvtrace_error_from_variants() {
        let store = KvTraceError::from(StoreError::LockPoisoned);
        assert!(matches!(store, KvTraceError::Store(_)));

        let conversion = KvTraceError::from(ConversionError::Custom {
            reason: "bad".to_string(),
        });
        assert!(matches!(conversion, KvTraceError::Conversion(_)));

        let fetch = KvTraceError::from(FetchError::RequestFailed {
            url: "http://localhost".to_string(),
            reason: "refused".to_string(),
        });
        assert!(matches!(fetch, KvTraceError::Fetch(_)));

        let config = KvTraceError::from(ConfigError::MissingRequired {
            field: "store.path".to_string(),
        });
        assert!(matches!(config, KvTraceError::Config(_)));
    }
}

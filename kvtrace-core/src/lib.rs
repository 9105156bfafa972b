//! kvtrace Core - Data Types
//!
//! Values, keys, telemetry key naming, call serialization and the error
//! taxonomy shared by every other kvtrace crate. No I/O lives here.

pub mod config;
pub mod error;
pub mod fetch;
pub mod identity;
pub mod repr;
pub mod value;

pub use config::{
    FetchConfig, KvTraceConfig, LoggingConfig, StoreBackend, StoreConfig,
    DEFAULT_ACCESS_TTL_SECS, MAX_ACCESS_TTL_SECS,
};
pub use error::{
    ConfigError, ConversionError, FetchError, KvTraceError, KvTraceResult, StoreError,
};
pub use fetch::PageFetcher;
pub use identity::{
    access_count_key, OperationId, TelemetryKeys, ACCESS_COUNT_PREFIX, INPUTS_SUFFIX,
    OUTPUTS_SUFFIX,
};
pub use repr::{error_repr, CallArgs, CallRepr, ABSENT_MARKER, ERROR_PREFIX};
pub use value::{decode_float, decode_int, decode_utf8, CacheKey, StoredValue};

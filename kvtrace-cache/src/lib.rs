//! kvtrace Cache - Instrumented Caching over a Key-Value Store
//!
//! - [`Cache`]: stores scalar values under generated keys
//! - [`Counted`] / [`Recorded`]: telemetry wrappers for any [`Operation`]
//! - [`replay`]: rebuilds a readable call trace from recorded history
//! - [`ResourceFetchCache`]: per-URL access counting with expiry

pub mod cache;
pub mod counting;
pub mod history;
pub mod http;
pub mod operation;
pub mod replay;
pub mod resource;

pub use cache::{Cache, CacheBuilder, CacheOperation, Instrumentation, CACHE_OWNER};
pub use counting::{call_count, Counted};
pub use history::{call_history, CallHistory, Recorded};
pub use http::HttpPageFetcher;
pub use operation::{DynOperation, FnOperation, Operation, OperationExt};
pub use replay::{print_replay, replay, CallTrace, RecordedCall};
pub use resource::ResourceFetchCache;

//! Key-value store trait.
//!
//! This is the surface every kvtrace component consumes: plain byte values,
//! atomic counters, append-only lists and per-key expiry in one flat key
//! space.

use async_trait::async_trait;
use kvtrace_core::KvTraceResult;
use std::time::Duration;

/// Key-value store trait for pluggable backends.
///
/// # Atomicity
///
/// `increment` and `append` must be atomic per key: concurrent callers never
/// lose an update or observe a partial write. Callers rely on this and never
/// emulate these operations with a local read-modify-write.
///
/// # Types
///
/// A key holds either bytes or a list. Using a list operation on a bytes key
/// (or the reverse) fails with `StoreError::WrongType`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// A name for logging, e.g. "memory" or "lmdb".
    fn name(&self) -> &'static str;

    /// Write `value` under `key`, replacing any previous value and expiry.
    async fn set(&self, key: &str, value: &[u8]) -> KvTraceResult<()>;

    /// Read the bytes under `key`. Absent or expired keys are `None`.
    async fn get(&self, key: &str) -> KvTraceResult<Option<Vec<u8>>>;

    /// Write `value` under `key`; the key is deleted once `ttl` elapses.
    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration)
        -> KvTraceResult<()>;

    /// Increment the integer under `key` by one and return the new value.
    ///
    /// Absent keys start at zero. An existing expiry is kept.
    async fn increment(&self, key: &str) -> KvTraceResult<i64>;

    /// Append `value` to the list under `key`, returning the new length.
    async fn append(&self, key: &str, value: &[u8]) -> KvTraceResult<u64>;

    /// Read list items `start..=end`. Negative indices count from the end,
    /// so `range(key, 0, -1)` is the whole list. Absent keys are empty.
    async fn range(&self, key: &str, start: i64, end: i64) -> KvTraceResult<Vec<Vec<u8>>>;

    /// Whether `key` holds a live value of any type.
    async fn exists(&self, key: &str) -> KvTraceResult<bool>;

    /// Remaining lifetime of `key`, or `None` if it is absent or has no expiry.
    async fn time_to_live(&self, key: &str) -> KvTraceResult<Option<Duration>>;

    /// Delete every key. Returns the number of keys removed.
    async fn flush_all(&self) -> KvTraceResult<u64>;
}

/// Resolve an inclusive, possibly negative `start..=end` range against a list
/// of `len` items. Returns `None` when the range selects nothing.
pub fn resolve_range(len: usize, start: i64, end: i64) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let end = if end < 0 { len + end } else { end.min(len - 1) };
    if start > end || start >= len || end < 0 {
        return None;
    }
    Some((start as usize, end as usize))
}

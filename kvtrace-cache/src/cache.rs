//! Instrumented value cache.
//!
//! `Cache` stores scalar values under freshly generated keys and reads them
//! back, optionally converting the raw bytes. Each public operation is an
//! [`Operation`] that can be counted and/or recorded without changing how
//! callers use the cache.

use std::collections::HashMap;
use std::sync::Arc;

use kvtrace_core::{
    decode_float, decode_int, decode_utf8, CacheKey, CallArgs, CallRepr, ConversionError,
    KvTraceResult, OperationId, StoredValue,
};
use kvtrace_storage::KeyValueStore;

use crate::counting::call_count;
use crate::history::{call_history, CallHistory};
use crate::operation::{DynOperation, FnOperation, Operation, OperationExt};

/// Owner name used in cache operation identities.
pub const CACHE_OWNER: &str = "Cache";

/// The instrumentable operations of [`Cache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    Store,
    Get,
    GetStr,
    GetInt,
    GetFloat,
}

impl CacheOperation {
    pub const ALL: [CacheOperation; 5] = [
        CacheOperation::Store,
        CacheOperation::Get,
        CacheOperation::GetStr,
        CacheOperation::GetInt,
        CacheOperation::GetFloat,
    ];

    pub fn method_name(self) -> &'static str {
        match self {
            CacheOperation::Store => "store",
            CacheOperation::Get => "get",
            CacheOperation::GetStr => "get_str",
            CacheOperation::GetInt => "get_int",
            CacheOperation::GetFloat => "get_float",
        }
    }

    /// `Cache.<method>`
    pub fn id(self) -> OperationId {
        OperationId::method(CACHE_OWNER, self.method_name())
    }
}

/// Which wrappers an operation gets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Instrumentation {
    pub counted: bool,
    pub recorded: bool,
}

/// Builder selecting instrumentation per cache operation.
pub struct CacheBuilder<S: ?Sized> {
    store: Arc<S>,
    modes: HashMap<CacheOperation, Instrumentation>,
}

impl<S> CacheBuilder<S>
where
    S: KeyValueStore + ?Sized + 'static,
{
    fn new(store: Arc<S>) -> Self {
        Self {
            store,
            modes: HashMap::new(),
        }
    }

    /// Count calls of `op`.
    pub fn count(mut self, op: CacheOperation) -> Self {
        self.modes.entry(op).or_default().counted = true;
        self
    }

    /// Record the arguments and results of `op`.
    pub fn record(mut self, op: CacheOperation) -> Self {
        self.modes.entry(op).or_default().recorded = true;
        self
    }

    /// Count and record `op`.
    pub fn instrument(self, op: CacheOperation) -> Self {
        self.count(op).record(op)
    }

    /// Count and record every operation.
    pub fn instrument_all(self) -> Self {
        CacheOperation::ALL
            .into_iter()
            .fold(self, |builder, op| builder.instrument(op))
    }

    pub fn build(self) -> Cache<S> {
        let mode = |op: CacheOperation| self.modes.get(&op).copied().unwrap_or_default();
        let store = &self.store;

        let store_op = {
            let s = Arc::clone(store);
            FnOperation::new(
                CacheOperation::Store.id(),
                move |(value,): (StoredValue,)| {
                    let store = Arc::clone(&s);
                    async move { put_value(&*store, value).await }
                },
            )
        };
        let get_op = {
            let s = Arc::clone(store);
            FnOperation::new(CacheOperation::Get.id(), move |(key,): (CacheKey,)| {
                let store = Arc::clone(&s);
                async move { read_raw(&*store, &key).await }
            })
        };
        let get_str_op = {
            let s = Arc::clone(store);
            FnOperation::new(CacheOperation::GetStr.id(), move |(key,): (CacheKey,)| {
                let store = Arc::clone(&s);
                async move { read_converted(&*store, &key, decode_utf8).await }
            })
        };
        let get_int_op = {
            let s = Arc::clone(store);
            FnOperation::new(CacheOperation::GetInt.id(), move |(key,): (CacheKey,)| {
                let store = Arc::clone(&s);
                async move { read_converted(&*store, &key, decode_int).await }
            })
        };
        let get_float_op = {
            let s = Arc::clone(store);
            FnOperation::new(CacheOperation::GetFloat.id(), move |(key,): (CacheKey,)| {
                let store = Arc::clone(&s);
                async move { read_converted(&*store, &key, decode_float).await }
            })
        };

        Cache {
            store_op: instrument(store_op, store, mode(CacheOperation::Store)),
            get_op: instrument(get_op, store, mode(CacheOperation::Get)),
            get_str_op: instrument(get_str_op, store, mode(CacheOperation::GetStr)),
            get_int_op: instrument(get_int_op, store, mode(CacheOperation::GetInt)),
            get_float_op: instrument(get_float_op, store, mode(CacheOperation::GetFloat)),
            store: Arc::clone(store),
        }
    }
}

fn instrument<Op, S>(
    op: Op,
    store: &Arc<S>,
    mode: Instrumentation,
) -> DynOperation<Op::Input, Op::Output>
where
    Op: Operation + 'static,
    Op::Input: CallArgs,
    Op::Output: CallRepr,
    S: KeyValueStore + ?Sized + 'static,
{
    match (mode.counted, mode.recorded) {
        // Counting wraps history so the counter is bumped before the input
        // is appended.
        (true, true) => Arc::new(op.recorded(Arc::clone(store)).counted(Arc::clone(store))),
        (true, false) => Arc::new(op.counted(Arc::clone(store))),
        (false, true) => Arc::new(op.recorded(Arc::clone(store))),
        (false, false) => Arc::new(op),
    }
}

async fn put_value<S>(store: &S, value: StoredValue) -> KvTraceResult<CacheKey>
where
    S: KeyValueStore + ?Sized,
{
    let key = CacheKey::generate();
    store.set(&key.to_store_key(), &value.to_bytes()).await?;
    tracing::debug!(key = %key, kind = value.kind(), store = store.name(), "Stored value");
    Ok(key)
}

async fn read_raw<S>(store: &S, key: &CacheKey) -> KvTraceResult<Option<Vec<u8>>>
where
    S: KeyValueStore + ?Sized,
{
    store.get(&key.to_store_key()).await
}

async fn read_converted<S, T, F>(store: &S, key: &CacheKey, convert: F) -> KvTraceResult<Option<T>>
where
    S: KeyValueStore + ?Sized,
    F: FnOnce(Vec<u8>) -> Result<T, ConversionError>,
{
    match read_raw(store, key).await? {
        Some(bytes) => Ok(Some(convert(bytes)?)),
        None => Ok(None),
    }
}

/// Value cache over a shared key-value store.
///
/// Construction never touches the store. Use [`Cache::flush`] to clear it;
/// the flush is visible to every holder of the same store.
///
/// # Example
///
/// ```ignore
/// let cache = Cache::instrumented(Arc::new(InMemoryStore::new()));
/// let key = cache.store("foo").await?;
/// assert_eq!(cache.get_str(&key).await?, Some("foo".to_string()));
/// ```
pub struct Cache<S: ?Sized> {
    store: Arc<S>,
    store_op: DynOperation<(StoredValue,), CacheKey>,
    get_op: DynOperation<(CacheKey,), Option<Vec<u8>>>,
    get_str_op: DynOperation<(CacheKey,), Option<String>>,
    get_int_op: DynOperation<(CacheKey,), Option<i64>>,
    get_float_op: DynOperation<(CacheKey,), Option<f64>>,
}

impl<S> Cache<S>
where
    S: KeyValueStore + ?Sized + 'static,
{
    /// Cache without instrumentation.
    pub fn new(store: Arc<S>) -> Self {
        CacheBuilder::new(store).build()
    }

    /// Cache whose `store` operation is counted and recorded.
    pub fn instrumented(store: Arc<S>) -> Self {
        CacheBuilder::new(store)
            .instrument(CacheOperation::Store)
            .build()
    }

    pub fn builder(store: Arc<S>) -> CacheBuilder<S> {
        CacheBuilder::new(store)
    }

    /// Store `value` under a fresh key and return the key.
    pub async fn store(&self, value: impl Into<StoredValue>) -> KvTraceResult<CacheKey> {
        self.store_op.call((value.into(),)).await
    }

    /// Raw bytes under `key`, or `None` if nothing was stored there.
    pub async fn get(&self, key: &CacheKey) -> KvTraceResult<Option<Vec<u8>>> {
        self.get_op.call((*key,)).await
    }

    /// Bytes under `key` passed through `convert`. The conversion only runs
    /// when a value is present.
    pub async fn get_with<T, F>(&self, key: &CacheKey, convert: F) -> KvTraceResult<Option<T>>
    where
        F: FnOnce(Vec<u8>) -> Result<T, ConversionError>,
    {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(convert(bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn get_str(&self, key: &CacheKey) -> KvTraceResult<Option<String>> {
        self.get_str_op.call((*key,)).await
    }

    pub async fn get_int(&self, key: &CacheKey) -> KvTraceResult<Option<i64>> {
        self.get_int_op.call((*key,)).await
    }

    pub async fn get_float(&self, key: &CacheKey) -> KvTraceResult<Option<f64>> {
        self.get_float_op.call((*key,)).await
    }

    /// Delete every key in the store, telemetry included.
    pub async fn flush(&self) -> KvTraceResult<u64> {
        let removed = self.store.flush_all().await?;
        tracing::info!(removed, store = self.store.name(), "Flushed cache store");
        Ok(removed)
    }

    /// Recorded call count of `op`.
    pub async fn call_count(&self, op: CacheOperation) -> KvTraceResult<i64> {
        call_count(&*self.store, &op.id()).await
    }

    /// Recorded call history of `op`.
    pub async fn history(&self, op: CacheOperation) -> KvTraceResult<CallHistory> {
        call_history(&*self.store, &op.id()).await
    }

    pub fn store_handle(&self) -> &Arc<S> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvtrace_core::KvTraceError;
    use kvtrace_storage::InMemoryStore;

    fn memory_store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new())
    }

    #[test]
    fn test_operation_ids() {
        assert_eq!(CacheOperation::Store.id().as_str(), "Cache.store");
        assert_eq!(CacheOperation::GetStr.id().as_str(), "Cache.get_str");
        assert_eq!(CacheOperation::GetFloat.id().as_str(), "Cache.get_float");
    }

    #[tokio::test]
    async fn test_store_and_read_back() {
        let cache = Cache::new(memory_store());

        let key = cache.store("foo").await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"foo".to_vec()));
        assert_eq!(cache.get_str(&key).await.unwrap(), Some("foo".to_string()));

        let key2 = cache.store(123i64).await.unwrap();
        assert_eq!(cache.get_int(&key2).await.unwrap(), Some(123));

        let key3 = cache.store(2.5f64).await.unwrap();
        assert_eq!(cache.get_float(&key3).await.unwrap(), Some(2.5));
    }

    #[tokio::test]
    async fn test_keys_are_fresh() {
        let cache = Cache::new(memory_store());
        let a = cache.store("same").await.unwrap();
        let b = cache.store("same").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_missing_key_is_absent_not_error() {
        let cache = Cache::new(memory_store());
        let key = CacheKey::generate();
        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert_eq!(cache.get_str(&key).await.unwrap(), None);
        assert_eq!(cache.get_int(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_with_skips_conversion_when_absent() {
        let cache = Cache::new(memory_store());
        let key = CacheKey::generate();
        let result = cache
            .get_with(&key, |_| -> Result<(), ConversionError> {
                panic!("conversion must not run for an absent key")
            })
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_conversion_failure_surfaces() {
        let cache = Cache::new(memory_store());
        let key = cache.store("not a number").await.unwrap();
        assert!(matches!(
            cache.get_int(&key).await,
            Err(KvTraceError::Conversion(ConversionError::InvalidInteger { .. }))
        ));

        let bytes = cache.store(vec![0xffu8, 0xfe]).await.unwrap();
        assert!(matches!(
            cache.get_str(&bytes).await,
            Err(KvTraceError::Conversion(ConversionError::InvalidUtf8 { .. }))
        ));
    }

    #[tokio::test]
    async fn test_get_with_custom_conversion() {
        let cache = Cache::builder(memory_store())
            .instrument(CacheOperation::Get)
            .build();
        let key = cache.store("a,b,c").await.unwrap();

        let parts = cache
            .get_with(&key, |bytes| {
                decode_utf8(bytes).map(|s| s.split(',').map(str::to_string).collect::<Vec<_>>())
            })
            .await
            .unwrap();
        assert_eq!(parts, Some(vec!["a".to_string(), "b".to_string(), "c".to_string()]));

        let err = cache
            .get_with(&key, |_| -> Result<u8, ConversionError> {
                Err(ConversionError::Custom {
                    reason: "not a header".to_string(),
                })
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            KvTraceError::Conversion(ConversionError::Custom {
                reason: "not a header".to_string()
            })
        );

        // Both reads went through the instrumented `get`; the conversion
        // failure happens after recording.
        assert_eq!(cache.call_count(CacheOperation::Get).await.unwrap(), 2);
        let history = cache.history(CacheOperation::Get).await.unwrap();
        assert!(history.is_aligned());
        assert_eq!(history.outputs[1], "b'a,b,c'");
    }

    #[tokio::test]
    async fn test_uninstrumented_cache_writes_no_telemetry() {
        let store = memory_store();
        let cache = Cache::new(Arc::clone(&store));
        cache.store("foo").await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(cache.call_count(CacheOperation::Store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_construction_does_not_flush() {
        let store = memory_store();
        let first = Cache::new(Arc::clone(&store));
        let key = first.store("keep me").await.unwrap();

        let second = Cache::instrumented(Arc::clone(&store));
        assert_eq!(
            second.get_str(&key).await.unwrap(),
            Some("keep me".to_string())
        );
    }

    #[tokio::test]
    async fn test_flush_clears_values_and_telemetry() {
        let store = memory_store();
        let cache = Cache::instrumented(Arc::clone(&store));
        let key = cache.store("foo").await.unwrap();

        // value, counter, inputs, outputs
        assert_eq!(cache.flush().await.unwrap(), 4);
        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert_eq!(cache.call_count(CacheOperation::Store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_builder_selects_operations() {
        let store = memory_store();
        let cache = Cache::builder(Arc::clone(&store))
            .count(CacheOperation::Get)
            .record(CacheOperation::GetStr)
            .build();

        let key = cache.store("foo").await.unwrap();
        cache.get(&key).await.unwrap();
        cache.get_str(&key).await.unwrap();

        assert_eq!(cache.call_count(CacheOperation::Store).await.unwrap(), 0);
        assert_eq!(cache.call_count(CacheOperation::Get).await.unwrap(), 1);
        assert!(cache.history(CacheOperation::Get).await.unwrap().inputs.is_empty());

        let history = cache.history(CacheOperation::GetStr).await.unwrap();
        assert_eq!(history.inputs, vec![format!("('{}',)", key)]);
        assert_eq!(history.outputs, vec!["'foo'".to_string()]);
        assert_eq!(cache.call_count(CacheOperation::GetStr).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_works_through_trait_object() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let cache = Cache::instrumented(store);
        let key = cache.store(7i64).await.unwrap();
        assert_eq!(cache.get_int(&key).await.unwrap(), Some(7));
        assert_eq!(cache.call_count(CacheOperation::Store).await.unwrap(), 1);
    }
}

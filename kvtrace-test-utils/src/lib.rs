//! kvtrace Test Utilities
//!
//! Shared test infrastructure for the kvtrace workspace:
//! - Proptest generators for stored values and operation names
//! - A scripted page fetcher
//! - Fixtures for common scenarios
//! - Assertions over recorded telemetry

pub use kvtrace_storage::{InMemoryStore, KeyValueStore};

pub use kvtrace_core::{
    CacheKey, FetchError, KvTraceConfig, KvTraceError, KvTraceResult, OperationId, PageFetcher,
    StoreError, StoredValue,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

// ============================================================================
// MOCK PAGE FETCHER
// ============================================================================

/// Page fetcher that serves canned bodies and records every requested URL.
///
/// Unknown URLs get a generated body so tests don't have to register every
/// page up front.
#[derive(Debug, Default)]
pub struct MockPageFetcher {
    pages: HashMap<String, String>,
    failure: Mutex<Option<FetchError>>,
    requests: Mutex<Vec<String>>,
}

impl MockPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }

    /// Fail every fetch with `error` until cleared.
    pub fn failing(error: FetchError) -> Self {
        Self {
            failure: Mutex::new(Some(error)),
            ..Self::default()
        }
    }

    /// Replace (or clear) the scripted failure.
    pub async fn set_failure(&self, error: Option<FetchError>) {
        *self.failure.lock().await = error;
    }

    /// URLs requested so far, in order. Failed requests are included.
    pub async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Body served for `url` when no page was registered.
    pub fn generated_body(url: &str) -> String {
        format!("<html><body>{}</body></html>", url)
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().await.push(url.to_string());

        if let Some(error) = self.failure.lock().await.clone() {
            return Err(error);
        }

        Ok(self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| Self::generated_body(url)))
    }
}

/// Fresh in-memory store behind an `Arc`, ready to share with a cache.
pub fn memory_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::new())
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for kvtrace types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a string value, including quotes and control characters.
    pub fn arb_str_value() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 '\\\\\n\t.,:!?-]{0,64}"
    }

    /// Generate a finite float. NaN never compares equal after a round trip.
    pub fn arb_float_value() -> impl Strategy<Value = f64> {
        -1.0e12f64..1.0e12f64
    }

    /// Generate any StoredValue variant.
    pub fn arb_stored_value() -> impl Strategy<Value = StoredValue> {
        prop_oneof![
            arb_str_value().prop_map(StoredValue::Str),
            prop::collection::vec(any::<u8>(), 0..64).prop_map(StoredValue::Bytes),
            any::<i64>().prop_map(StoredValue::Int),
            arb_float_value().prop_map(StoredValue::Float),
        ]
    }

    /// Generate an `<Owner>.<method>` operation name.
    pub fn arb_operation_name() -> impl Strategy<Value = OperationId> {
        ("[A-Z][a-zA-Z]{0,15}", "[a-z][a-z_]{0,15}")
            .prop_map(|(owner, method)| OperationId::method(&owner, &method))
    }

    /// Generate a URL on a fixed test host.
    pub fn arb_url() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,12}(/[a-z0-9]{1,8}){0,3}"
            .prop_map(|path| format!("http://example.test/{}", path))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;

    /// The three values stored by the canonical instrumentation scenario.
    pub fn sample_values() -> Vec<StoredValue> {
        vec![
            StoredValue::from("foo"),
            StoredValue::from("bar"),
            StoredValue::from(42i64),
        ]
    }

    /// Local defaults with a short access window.
    pub fn test_config() -> KvTraceConfig {
        let mut config = KvTraceConfig::local_defaults();
        config.fetch.access_ttl_secs = 2;
        config.fetch.request_timeout_ms = 1_000;
        config.fetch.user_agent = "kvtrace-test".to_string();
        config
    }

    /// A fetch failure as a network client would report it.
    pub fn connection_refused(url: &str) -> FetchError {
        FetchError::RequestFailed {
            url: url.to_string(),
            reason: "connection refused".to_string(),
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over telemetry recorded in a store.

    use super::*;

    /// Read a whole list as UTF-8 strings.
    pub async fn read_list<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Vec<String> {
        store
            .range(key, 0, -1)
            .await
            .unwrap_or_else(|e| panic!("range({}) failed: {}", key, e))
            .into_iter()
            .map(|item| String::from_utf8_lossy(&item).into_owned())
            .collect()
    }

    /// Assert the counter of `id` equals `expected`. An absent counter is zero.
    pub async fn assert_call_count<S: KeyValueStore + ?Sized>(
        store: &S,
        id: &OperationId,
        expected: i64,
    ) {
        let actual = store
            .get(id.keys().counter())
            .await
            .unwrap_or_else(|e| panic!("get({}) failed: {}", id, e))
            .map(|bytes| {
                String::from_utf8_lossy(&bytes)
                    .parse::<i64>()
                    .unwrap_or_else(|e| panic!("counter is not an integer: {}", e))
            })
            .unwrap_or(0);
        assert_eq!(actual, expected, "unexpected call count for {}", id);
    }

    /// Assert both history lists of `id` hold exactly `expected` entries.
    pub async fn assert_history_len<S: KeyValueStore + ?Sized>(
        store: &S,
        id: &OperationId,
        expected: usize,
    ) {
        let keys = id.keys();
        let inputs = read_list(store, keys.inputs()).await;
        let outputs = read_list(store, keys.outputs()).await;
        assert_eq!(inputs.len(), expected, "{} inputs: {:?}", id, inputs);
        assert_eq!(outputs.len(), expected, "{} outputs: {:?}", id, outputs);
    }

    /// Assert a result is a store error.
    #[track_caller]
    pub fn assert_store_error<T: std::fmt::Debug>(result: &KvTraceResult<T>) {
        match result {
            Err(KvTraceError::Store(_)) => {}
            other => panic!("Expected Store error, got: {:?}", other),
        }
    }

    /// Assert a result is a fetch error.
    #[track_caller]
    pub fn assert_fetch_error<T: std::fmt::Debug>(result: &KvTraceResult<T>) {
        match result {
            Err(KvTraceError::Fetch(_)) => {}
            other => panic!("Expected Fetch error, got: {:?}", other),
        }
    }
}

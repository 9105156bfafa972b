//! Access counting for fetched resources.
//!
//! Every fetch bumps a per-URL counter that expires a fixed time after the
//! first access in a window. The body itself is never cached: each call goes
//! to the network.

use std::sync::Arc;
use std::time::Duration;

use kvtrace_core::{
    access_count_key, decode_int, FetchConfig, KvTraceResult, PageFetcher,
    DEFAULT_ACCESS_TTL_SECS,
};
use kvtrace_storage::KeyValueStore;

/// Counts accesses per URL and fetches through a [`PageFetcher`].
pub struct ResourceFetchCache<S: ?Sized, F: ?Sized> {
    store: Arc<S>,
    fetcher: Arc<F>,
    ttl: Duration,
}

impl<S, F> ResourceFetchCache<S, F>
where
    S: KeyValueStore + ?Sized,
    F: PageFetcher + ?Sized,
{
    /// Counter window of ten seconds.
    pub fn new(store: Arc<S>, fetcher: Arc<F>) -> Self {
        Self::with_ttl(store, fetcher, Duration::from_secs(DEFAULT_ACCESS_TTL_SECS))
    }

    pub fn with_ttl(store: Arc<S>, fetcher: Arc<F>, ttl: Duration) -> Self {
        Self {
            store,
            fetcher,
            ttl,
        }
    }

    pub fn from_config(store: Arc<S>, fetcher: Arc<F>, config: &FetchConfig) -> Self {
        Self::with_ttl(store, fetcher, config.access_ttl())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Count an access to `url`, then fetch it.
    ///
    /// A fetch failure is returned as is; the counter update stays.
    pub async fn fetch(&self, url: &str) -> KvTraceResult<String> {
        let count = self.count_access(url).await?;
        tracing::debug!(url, count, "Counted resource access");

        let body = self.fetcher.fetch(url).await?;
        Ok(body)
    }

    /// Current access count of `url` within its window.
    pub async fn access_count(&self, url: &str) -> KvTraceResult<Option<i64>> {
        match self.store.get(&access_count_key(url)).await? {
            Some(bytes) => Ok(Some(decode_int(bytes)?)),
            None => Ok(None),
        }
    }

    async fn count_access(&self, url: &str) -> KvTraceResult<i64> {
        let key = access_count_key(url);
        if self.store.exists(&key).await? {
            let count = self.store.increment(&key).await?;
            if count == 1 {
                // The window lapsed between `exists` and `increment`, so the
                // counter was recreated without an expiry.
                self.store.set_with_expiry(&key, b"1", self.ttl).await?;
            }
            Ok(count)
        } else {
            // Not atomic with `exists`: two first accesses racing here both
            // write 1 and one of them is lost.
            self.store.set_with_expiry(&key, b"1", self.ttl).await?;
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kvtrace_core::{FetchError, KvTraceError, StoreError};
    use kvtrace_storage::InMemoryStore;

    struct EchoFetcher;

    #[async_trait]
    impl PageFetcher for EchoFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            Ok(format!("body of {}", url))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_starts_with_ttl() {
        let store = Arc::new(InMemoryStore::new());
        let cache = ResourceFetchCache::new(Arc::clone(&store), Arc::new(EchoFetcher));

        let body = cache.fetch("http://a.test").await.unwrap();
        assert_eq!(body, "body of http://a.test");
        assert_eq!(cache.access_count("http://a.test").await.unwrap(), Some(1));
        assert_eq!(
            store.time_to_live("count:http://a.test").await.unwrap(),
            Some(Duration::from_secs(10))
        );
    }

    #[tokio::test]
    async fn test_unseen_url_has_no_count() {
        let cache = ResourceFetchCache::new(Arc::new(InMemoryStore::new()), Arc::new(EchoFetcher));
        assert_eq!(cache.access_count("http://never.test").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_out_of_range_window_fails_before_fetching() {
        let cache = ResourceFetchCache::with_ttl(
            Arc::new(InMemoryStore::new()),
            Arc::new(EchoFetcher),
            Duration::from_secs(u64::MAX),
        );
        assert!(matches!(
            cache.fetch("http://a.test").await,
            Err(KvTraceError::Store(StoreError::ExpiryOutOfRange { .. }))
        ));
        assert_eq!(cache.access_count("http://a.test").await.unwrap(), None);
    }

    #[test]
    fn test_ttl_from_config() {
        let mut config = kvtrace_core::KvTraceConfig::local_defaults().fetch;
        config.access_ttl_secs = 3;
        let cache = ResourceFetchCache::from_config(
            Arc::new(InMemoryStore::new()),
            Arc::new(EchoFetcher),
            &config,
        );
        assert_eq!(cache.ttl(), Duration::from_secs(3));
    }
}

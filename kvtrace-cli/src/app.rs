//! Command execution.

use std::io::Write;
use std::sync::Arc;

use kvtrace_cache::{replay, Cache, CacheOperation, HttpPageFetcher, ResourceFetchCache};
use kvtrace_core::{ConfigError, KvTraceConfig, OperationId, PageFetcher, StoreBackend};
use kvtrace_storage::{InMemoryStore, KeyValueStore, LmdbStore};

use crate::args::Command;
use crate::error::CliError;

/// Open the store selected by `config`.
pub fn open_store(config: &KvTraceConfig) -> Result<Arc<dyn KeyValueStore>, CliError> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        StoreBackend::Lmdb => {
            let path = config
                .store
                .path
                .as_ref()
                .ok_or_else(|| ConfigError::MissingRequired {
                    field: "store.path".to_string(),
                })?;
            Ok(Arc::new(LmdbStore::open(path, config.store.map_size_mb)?))
        }
    }
}

/// The CLI bound to one store.
pub struct App {
    config: KvTraceConfig,
    store: Arc<dyn KeyValueStore>,
}

impl App {
    pub fn new(config: KvTraceConfig) -> Result<Self, CliError> {
        let store = open_store(&config)?;
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: KvTraceConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self { config, store }
    }

    /// Run `command`, writing results to `out` and diagnostics to `err`.
    pub async fn run<W, E>(&self, command: Command, out: &mut W, err: &mut E) -> Result<(), CliError>
    where
        W: Write,
        E: Write,
    {
        tracing::debug!(command = ?command, store = self.store.name(), "Running command");
        match command {
            Command::Demo { fresh } => self.demo(fresh, out).await,
            Command::Replay { operation } => self.replay(&operation, out).await,
            Command::Fetch { url } => {
                let fetcher = Arc::new(HttpPageFetcher::new(&self.config.fetch)?);
                self.fetch_with(fetcher, &url, out, err).await
            }
            Command::Flush => {
                let removed = Cache::new(Arc::clone(&self.store)).flush().await?;
                writeln!(err, "flushed {} keys", removed)?;
                Ok(())
            }
        }
    }

    async fn demo<W: Write>(&self, fresh: bool, out: &mut W) -> Result<(), CliError> {
        let cache = Cache::instrumented(Arc::clone(&self.store));
        if fresh {
            cache.flush().await?;
        }

        let foo = cache.store("foo").await?;
        let bar = cache.store("bar").await?;
        let answer = cache.store(42i64).await?;

        writeln!(out, "get({}) = {:?}", foo, cache.get(&foo).await?)?;
        writeln!(out, "get_str({}) = {:?}", bar, cache.get_str(&bar).await?)?;
        writeln!(out, "get_int({}) = {:?}", answer, cache.get_int(&answer).await?)?;
        writeln!(out)?;

        self.replay(&CacheOperation::Store.id(), out).await
    }

    async fn replay<W: Write>(&self, operation: &OperationId, out: &mut W) -> Result<(), CliError> {
        let trace = replay(&*self.store, operation).await?;
        trace.write_to(out)?;
        Ok(())
    }

    /// Fetch `url` through `fetcher`, counting the access.
    pub async fn fetch_with<W, E>(
        &self,
        fetcher: Arc<dyn PageFetcher>,
        url: &str,
        out: &mut W,
        err: &mut E,
    ) -> Result<(), CliError>
    where
        W: Write,
        E: Write,
    {
        let resources =
            ResourceFetchCache::from_config(Arc::clone(&self.store), fetcher, &self.config.fetch);
        let body = resources.fetch(url).await?;
        writeln!(out, "{}", body)?;

        let count = resources.access_count(url).await?.unwrap_or(0);
        writeln!(
            err,
            "{} accessed {} times in the last {}s",
            url,
            count,
            resources.ttl().as_secs()
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvtrace_test_utils::MockPageFetcher;

    fn memory_app() -> App {
        App::new(KvTraceConfig::local_defaults()).unwrap()
    }

    async fn run(app: &App, command: Command) -> (String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        app.run(command, &mut out, &mut err).await.unwrap();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_demo_prints_reads_and_replay() {
        let app = memory_app();
        let (out, _) = run(&app, Command::Demo { fresh: false }).await;

        assert!(out.contains("= Some([102, 111, 111])"));
        assert!(out.contains("= Some(\"bar\")"));
        assert!(out.contains("= Some(42)"));
        assert!(out.contains("Cache.store was called 3 times:\n"));
        assert!(out.contains("Cache.store(*('foo',)) -> "));
        assert!(out.contains("Cache.store(*(42,)) -> "));
    }

    #[tokio::test]
    async fn test_demo_accumulates_unless_fresh() {
        let app = memory_app();
        run(&app, Command::Demo { fresh: false }).await;
        let (out, _) = run(&app, Command::Demo { fresh: false }).await;
        assert!(out.contains("Cache.store was called 6 times:"));

        let (out, _) = run(&app, Command::Demo { fresh: true }).await;
        assert!(out.contains("Cache.store was called 3 times:"));
    }

    #[tokio::test]
    async fn test_replay_unknown_operation() {
        let app = memory_app();
        let (out, _) = run(
            &app,
            Command::Replay {
                operation: OperationId::new("Cache.get"),
            },
        )
        .await;
        assert_eq!(out, "Cache.get was called 0 times:\n");
    }

    #[tokio::test]
    async fn test_flush_reports_removed_keys() {
        let app = memory_app();
        run(&app, Command::Demo { fresh: false }).await;
        let (_, err) = run(&app, Command::Flush).await;
        // three values, one counter, two history lists
        assert_eq!(err, "flushed 6 keys\n");
    }

    #[tokio::test]
    async fn test_fetch_with_mock() {
        let app = memory_app();
        let fetcher = Arc::new(MockPageFetcher::new().with_page("http://a.test", "hello"));
        let mut out = Vec::new();
        let mut err = Vec::new();

        app.fetch_with(fetcher.clone(), "http://a.test", &mut out, &mut err)
            .await
            .unwrap();
        app.fetch_with(fetcher, "http://a.test", &mut out, &mut err)
            .await
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "hello\nhello\n");
        let err = String::from_utf8(err).unwrap();
        assert!(err.contains("http://a.test accessed 2 times in the last 10s"));
    }

    #[test]
    fn test_open_lmdb_requires_path() {
        let mut config = KvTraceConfig::local_defaults();
        config.store.backend = StoreBackend::Lmdb;
        assert!(matches!(open_store(&config), Err(CliError::KvTrace(_))));

        let dir = tempfile::TempDir::new().unwrap();
        config.store.path = Some(dir.path().to_path_buf());
        let store = open_store(&config).unwrap();
        assert_eq!(store.name(), "lmdb");
    }
}

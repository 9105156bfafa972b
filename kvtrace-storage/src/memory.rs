//! In-memory key-value store.
//!
//! Uses tokio::sync::RwLock for safe async access. Every mutation runs under
//! the write lock, which makes `increment` and `append` atomic per key.
//! Expiry is measured with `tokio::time::Instant`, so tests can pause and
//! advance the clock. Expired entries are swept on every write.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use kvtrace_core::{KvTraceResult, StoreError};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::traits::{resolve_range, KeyValueStore};

#[derive(Debug, Clone)]
enum Value {
    Bytes(Vec<u8>),
    List(Vec<Vec<u8>>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local store with per-key expiry.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Drop every expired entry.
fn sweep_expired(entries: &mut HashMap<String, Entry>, now: Instant) {
    entries.retain(|_, e| !e.is_expired(now));
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn set(&self, key: &str, value: &[u8]) -> KvTraceResult<()> {
        let mut entries = self.entries.write().await;
        sweep_expired(&mut entries, Instant::now());
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Bytes(value.to_vec()),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> KvTraceResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.value {
                Value::Bytes(bytes) => Ok(Some(bytes.clone())),
                Value::List(_) => Err(StoreError::WrongType {
                    key: key.to_string(),
                    expected: "bytes",
                }
                .into()),
            },
            _ => Ok(None),
        }
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> KvTraceResult<()> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| StoreError::ExpiryOutOfRange {
                key: key.to_string(),
            })?;
        let mut entries = self.entries.write().await;
        sweep_expired(&mut entries, now);
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Bytes(value.to_vec()),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn increment(&self, key: &str) -> KvTraceResult<i64> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        sweep_expired(&mut entries, now);

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Bytes(b"0".to_vec()),
            expires_at: None,
        });
        let Value::Bytes(bytes) = &mut entry.value else {
            return Err(StoreError::WrongType {
                key: key.to_string(),
                expected: "integer",
            }
            .into());
        };

        let current = std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.parse::<i64>().ok())
            .ok_or_else(|| StoreError::NotAnInteger {
                key: key.to_string(),
            })?;
        let next = current.checked_add(1).ok_or_else(|| StoreError::NotAnInteger {
            key: key.to_string(),
        })?;
        *bytes = next.to_string().into_bytes();
        Ok(next)
    }

    async fn append(&self, key: &str, value: &[u8]) -> KvTraceResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        sweep_expired(&mut entries, now);

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::List(Vec::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::List(items) => {
                items.push(value.to_vec());
                Ok(items.len() as u64)
            }
            Value::Bytes(_) => Err(StoreError::WrongType {
                key: key.to_string(),
                expected: "list",
            }
            .into()),
        }
    }

    async fn range(&self, key: &str, start: i64, end: i64) -> KvTraceResult<Vec<Vec<u8>>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.value {
                Value::List(items) => Ok(resolve_range(items.len(), start, end)
                    .map(|(from, to)| items[from..=to].to_vec())
                    .unwrap_or_default()),
                Value::Bytes(_) => Err(StoreError::WrongType {
                    key: key.to_string(),
                    expected: "list",
                }
                .into()),
            },
            _ => Ok(Vec::new()),
        }
    }

    async fn exists(&self, key: &str) -> KvTraceResult<bool> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries.get(key).is_some_and(|e| !e.is_expired(now)))
    }

    async fn time_to_live(&self, key: &str) -> KvTraceResult<Option<Duration>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn flush_all(&self) -> KvTraceResult<u64> {
        let mut entries = self.entries.write().await;
        sweep_expired(&mut entries, Instant::now());
        let removed = entries.len() as u64;
        entries.clear();
        tracing::info!(removed, store = "memory", "Flushed store");
        Ok(removed)
    }
}

//! LMDB-backed key-value store.
//!
//! Uses the heed crate (Rust bindings for LMDB) so telemetry and cached
//! payloads survive the process and can be shared between processes on one
//! host.
//!
//! # Record Format
//!
//! Every value is stored as:
//! - Byte 0: type tag (0 = bytes, 1 = list)
//! - Bytes 1-8: expiry as unix milliseconds, little-endian i64 (0 = none)
//! - Bytes 9..: payload
//!
//! List payloads are a sequence of `[len: u32 LE][item bytes]`.
//!
//! # Thread Safety
//!
//! LMDB serializes write transactions across threads and processes. Every
//! mutation (including `increment` and `append`) is a read-modify-write inside
//! one write transaction, so it is atomic per key.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use kvtrace_core::{KvTraceResult, StoreError};

use crate::traits::{resolve_range, KeyValueStore};

const TAG_BYTES: u8 = 0;
const TAG_LIST: u8 = 1;
const HEADER_LEN: usize = 9;
const NO_EXPIRY: i64 = 0;

/// Decoded record value.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RecordValue {
    Bytes(Vec<u8>),
    List(Vec<Vec<u8>>),
}

/// A decoded record with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Record {
    value: RecordValue,
    expires_at_ms: i64,
}

impl Record {
    fn bytes(value: Vec<u8>, expires_at_ms: i64) -> Self {
        Self {
            value: RecordValue::Bytes(value),
            expires_at_ms,
        }
    }

    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms != NO_EXPIRY && self.expires_at_ms <= now_ms
    }

    fn encode(&self) -> Vec<u8> {
        let (tag, payload) = match &self.value {
            RecordValue::Bytes(bytes) => (TAG_BYTES, bytes.clone()),
            RecordValue::List(items) => {
                let size = items.iter().map(|i| 4 + i.len()).sum();
                let mut payload = Vec::with_capacity(size);
                for item in items {
                    payload.extend_from_slice(&(item.len() as u32).to_le_bytes());
                    payload.extend_from_slice(item);
                }
                (TAG_LIST, payload)
            }
        };

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.push(tag);
        out.extend_from_slice(&self.expires_at_ms.to_le_bytes());
        out.extend_from_slice(&payload);
        out
    }

    fn decode(key: &str, bytes: &[u8]) -> Result<Self, StoreError> {
        let corrupt = |reason: &str| StoreError::Corrupt {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if bytes.len() < HEADER_LEN {
            return Err(corrupt("record shorter than header"));
        }
        let expiry: [u8; 8] = bytes[1..HEADER_LEN]
            .try_into()
            .map_err(|_| corrupt("invalid expiry"))?;
        let expires_at_ms = i64::from_le_bytes(expiry);
        let payload = &bytes[HEADER_LEN..];

        let value = match bytes[0] {
            TAG_BYTES => RecordValue::Bytes(payload.to_vec()),
            TAG_LIST => {
                let mut items = Vec::new();
                let mut rest = payload;
                while !rest.is_empty() {
                    if rest.len() < 4 {
                        return Err(corrupt("truncated list item length"));
                    }
                    let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
                    rest = &rest[4..];
                    if rest.len() < len {
                        return Err(corrupt("truncated list item"));
                    }
                    items.push(rest[..len].to_vec());
                    rest = &rest[len..];
                }
                RecordValue::List(items)
            }
            _ => return Err(corrupt("unknown type tag")),
        };

        Ok(Self {
            value,
            expires_at_ms,
        })
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Absolute expiry of a record written at `now_ms` with `ttl`.
fn expiry_deadline(key: &str, now_ms: i64, ttl: Duration) -> Result<i64, StoreError> {
    i64::try_from(ttl.as_millis())
        .ok()
        .and_then(|ttl_ms| now_ms.checked_add(ttl_ms))
        // A zero expiry field means "no expiry", so never land exactly on it.
        .map(|at| at.max(1))
        .ok_or_else(|| StoreError::ExpiryOutOfRange {
            key: key.to_string(),
        })
}

fn txn_error(e: heed::Error) -> StoreError {
    StoreError::Transaction {
        reason: e.to_string(),
    }
}

/// LMDB-backed key-value store.
///
/// # Example
///
/// ```ignore
/// use kvtrace_storage::{KeyValueStore, LmdbStore};
///
/// let store = LmdbStore::open("/tmp/kvtrace", 64)?;
/// store.set("greeting", b"hello").await?;
/// ```
pub struct LmdbStore {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open (or create) an LMDB store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `map_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the directory cannot be created or
    /// the environment cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, map_size_mb: usize) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&path).map_err(|e| StoreError::Unavailable {
            reason: e.to_string(),
        })?;

        // SAFETY: the environment is opened once per path by this process and
        // the map is never resized while open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| StoreError::Unavailable {
            reason: e.to_string(),
        })?;

        let mut wtxn = env.write_txn().map_err(txn_error)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;

        tracing::info!(path = %path.as_ref().display(), map_size_mb, "Opened LMDB store");

        Ok(Self { env, db })
    }

    fn read<T>(&self, f: impl FnOnce(&RoTxn<'_>) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        f(&rtxn)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut RwTxn<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let out = f(&mut wtxn)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(out)
    }

    /// Load a live record, treating expired records as absent.
    fn load(&self, txn: &RoTxn<'_>, key: &str, now: i64) -> Result<Option<Record>, StoreError> {
        match self.db.get(txn, key.as_bytes()).map_err(txn_error)? {
            Some(bytes) => {
                let record = Record::decode(key, bytes)?;
                Ok((!record.is_expired(now)).then_some(record))
            }
            None => Ok(None),
        }
    }

    fn put(&self, txn: &mut RwTxn<'_>, key: &str, record: &Record) -> Result<(), StoreError> {
        self.db
            .put(txn, key.as_bytes(), &record.encode())
            .map_err(txn_error)
    }
}

#[async_trait]
impl KeyValueStore for LmdbStore {
    fn name(&self) -> &'static str {
        "lmdb"
    }

    async fn set(&self, key: &str, value: &[u8]) -> KvTraceResult<()> {
        let record = Record::bytes(value.to_vec(), NO_EXPIRY);
        self.write(|txn| self.put(txn, key, &record))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> KvTraceResult<Option<Vec<u8>>> {
        let now = now_ms();
        let record = self.read(|txn| self.load(txn, key, now))?;
        match record.map(|r| r.value) {
            Some(RecordValue::Bytes(bytes)) => Ok(Some(bytes)),
            Some(RecordValue::List(_)) => Err(StoreError::WrongType {
                key: key.to_string(),
                expected: "bytes",
            }
            .into()),
            None => Ok(None),
        }
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> KvTraceResult<()> {
        let expires_at_ms = expiry_deadline(key, now_ms(), ttl)?;
        let record = Record::bytes(value.to_vec(), expires_at_ms);
        self.write(|txn| self.put(txn, key, &record))?;
        Ok(())
    }

    async fn increment(&self, key: &str) -> KvTraceResult<i64> {
        let now = now_ms();
        let next = self.write(|txn| {
            let (current, expires_at_ms) = match self.load(txn, key, now)? {
                Some(Record {
                    value: RecordValue::Bytes(bytes),
                    expires_at_ms,
                }) => {
                    let current = std::str::from_utf8(&bytes)
                        .ok()
                        .and_then(|text| text.parse::<i64>().ok())
                        .ok_or_else(|| StoreError::NotAnInteger {
                            key: key.to_string(),
                        })?;
                    (current, expires_at_ms)
                }
                Some(Record {
                    value: RecordValue::List(_),
                    ..
                }) => {
                    return Err(StoreError::WrongType {
                        key: key.to_string(),
                        expected: "integer",
                    })
                }
                None => (0, NO_EXPIRY),
            };

            let next = current.checked_add(1).ok_or_else(|| StoreError::NotAnInteger {
                key: key.to_string(),
            })?;
            let record = Record::bytes(next.to_string().into_bytes(), expires_at_ms);
            self.put(txn, key, &record)?;
            Ok(next)
        })?;
        Ok(next)
    }

    async fn append(&self, key: &str, value: &[u8]) -> KvTraceResult<u64> {
        let now = now_ms();
        let len = self.write(|txn| {
            let (mut items, expires_at_ms) = match self.load(txn, key, now)? {
                Some(Record {
                    value: RecordValue::List(items),
                    expires_at_ms,
                }) => (items, expires_at_ms),
                Some(Record {
                    value: RecordValue::Bytes(_),
                    ..
                }) => {
                    return Err(StoreError::WrongType {
                        key: key.to_string(),
                        expected: "list",
                    })
                }
                None => (Vec::new(), NO_EXPIRY),
            };

            items.push(value.to_vec());
            let len = items.len() as u64;
            let record = Record {
                value: RecordValue::List(items),
                expires_at_ms,
            };
            self.put(txn, key, &record)?;
            Ok(len)
        })?;
        Ok(len)
    }

    async fn range(&self, key: &str, start: i64, end: i64) -> KvTraceResult<Vec<Vec<u8>>> {
        let now = now_ms();
        let record = self.read(|txn| self.load(txn, key, now))?;
        match record.map(|r| r.value) {
            Some(RecordValue::List(items)) => Ok(resolve_range(items.len(), start, end)
                .map(|(from, to)| items[from..=to].to_vec())
                .unwrap_or_default()),
            Some(RecordValue::Bytes(_)) => Err(StoreError::WrongType {
                key: key.to_string(),
                expected: "list",
            }
            .into()),
            None => Ok(Vec::new()),
        }
    }

    async fn exists(&self, key: &str) -> KvTraceResult<bool> {
        let now = now_ms();
        let record = self.read(|txn| self.load(txn, key, now))?;
        Ok(record.is_some())
    }

    async fn time_to_live(&self, key: &str) -> KvTraceResult<Option<Duration>> {
        let now = now_ms();
        let record = self.read(|txn| self.load(txn, key, now))?;
        Ok(record
            .filter(|r| r.expires_at_ms != NO_EXPIRY)
            .map(|r| Duration::from_millis((r.expires_at_ms - now).max(0) as u64)))
    }

    async fn flush_all(&self) -> KvTraceResult<u64> {
        let removed = self.write(|txn| {
            let removed = self.db.len(txn).map_err(txn_error)?;
            self.db.clear(txn).map_err(txn_error)?;
            Ok(removed)
        })?;
        tracing::info!(removed, store = "lmdb", "Flushed store");
        Ok(removed)
    }
}

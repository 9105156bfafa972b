//! kvtrace Storage - Key-Value Store Trait and Backends
//!
//! The flat key space every kvtrace component writes to. `InMemoryStore` is
//! process-local; `LmdbStore` persists to disk and can be shared by several
//! processes on one host.

pub mod lmdb_backend;
pub mod memory;
pub mod traits;

pub use lmdb_backend::LmdbStore;
pub use memory::InMemoryStore;
pub use traits::{resolve_range, KeyValueStore};

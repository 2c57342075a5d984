//! Keyed request cache.
//!
//! This module provides an endpoint-agnostic caching mechanism that:
//! - Keys entries by logical endpoint (each endpoint decides what goes into the key)
//! - Merges newly fetched values into existing entries with a per-endpoint rule
//! - Lets each endpoint decide when an existing entry must be refetched
//! - Expires entries that have gone unused for longer than their time-to-live
//! - Persists entries through a storage backend (SQLite or memory)

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{CacheStorage, MemoryStorage, StoredEntry};
pub use traits::{merge_by_page, CacheResult, CacheSource, Endpoint};

//! Cache module for storing feed payloads
//!
//! This module provides a cache store that persists normalized payloads with
//! their write time and logical day. Reads ignore age so that expired entries
//! can still be served while a refresh is in flight or after every upstream
//! has failed; callers decide freshness with `CacheStore::is_fresh`.

mod manager;
mod store;

pub use manager::{CacheEntry, CacheStore};
pub use store::{open_default_store, FileStore, KeyValueStore, MemoryStore, StoreError};

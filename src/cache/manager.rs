//! Cache manager for persisting feed payloads
//!
//! Provides a `CacheStore` that wraps any `KeyValueStore` with timestamped
//! entries, stale reads and TTL checks. Failures of the medium never reach
//! the caller: a broken read is "no cache", a broken write is logged and
//! dropped.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::store::KeyValueStore;

/// A cached payload as persisted by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// When the entry was written
    pub timestamp: DateTime<Utc>,
    /// Calendar day (`YYYY-MM-DD`) the payload itself is dated to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    /// The cached data
    pub data: T,
}

/// Borrowing twin of `CacheEntry` so writes don't need to clone the payload
#[derive(Serialize)]
struct CacheEntryRef<'a, T> {
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    day: Option<&'a str>,
    data: &'a T,
}

/// Reads and writes timestamped entries on top of a persistence medium
#[derive(Clone)]
pub struct CacheStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore").finish_non_exhaustive()
    }
}

impl CacheStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Reads an entry regardless of its age
    ///
    /// Returns `None` if the key is absent, the medium fails, or the stored
    /// value does not parse as a `CacheEntry<T>`.
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                log::warn!("cache read for '{}' failed: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!("discarding unreadable cache entry '{}': {}", key, e);
                None
            }
        }
    }

    /// Replaces the entry under `key`, stamped with the current time
    pub async fn write<T: Serialize>(&self, key: &str, data: &T, day: Option<&str>) {
        let entry = CacheEntryRef {
            timestamp: Utc::now(),
            day,
            data,
        };

        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("cache entry '{}' could not be serialized: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.store.set(key, json).await {
            log::warn!("cache write for '{}' failed: {}", key, e);
        }
    }

    /// Whether `entry` is younger than `ttl` right now
    pub fn is_fresh<T>(entry: &CacheEntry<T>, ttl: Duration) -> bool {
        Self::is_fresh_at(entry, ttl, Utc::now())
    }

    /// Whether `entry` is younger than `ttl` at instant `now`
    ///
    /// An entry stamped after `now` (the clock moved backwards) is stale.
    pub fn is_fresh_at<T>(entry: &CacheEntry<T>, ttl: Duration, now: DateTime<Utc>) -> bool {
        if now < entry.timestamp {
            return false;
        }
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return true;
        };
        now - entry.timestamp < ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FileStore, MemoryStore, StoreError};
    use async_trait::async_trait;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    fn create_test_cache() -> (CacheStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = CacheStore::new(Arc::new(FileStore::with_dir(temp_dir.path().to_path_buf())));
        (cache, temp_dir)
    }

    fn entry_at(timestamp: DateTime<Utc>) -> CacheEntry<TestData> {
        CacheEntry {
            timestamp,
            day: None,
            data: TestData {
                name: "ttl".to_string(),
                value: 0,
            },
        }
    }

    /// Medium that fails every operation
    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into())
        }

        async fn set(&self, _key: &str, _value: String) -> Result<(), StoreError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into())
        }
    }

    #[tokio::test]
    async fn test_read_returns_none_for_missing_key() {
        let (cache, _temp_dir) = create_test_cache();
        let result: Option<CacheEntry<TestData>> = cache.read("nonexistent_key").await;
        assert!(result.is_none(), "Should return None for missing key");
    }

    #[tokio::test]
    async fn test_write_then_read_keeps_day_and_data() {
        let (cache, _temp_dir) = create_test_cache();
        let data = TestData {
            name: "wallpaper".to_string(),
            value: 42,
        };

        let before = Utc::now();
        cache.write("wallpaper", &data, Some("2026-01-05")).await;
        let after = Utc::now();

        let entry: CacheEntry<TestData> = cache.read("wallpaper").await.expect("Should read cache");
        assert_eq!(entry.data, data);
        assert_eq!(entry.day.as_deref(), Some("2026-01-05"));
        assert!(entry.timestamp >= before && entry.timestamp <= after);
    }

    #[tokio::test]
    async fn test_entry_without_day_omits_field() {
        let store = MemoryStore::new();
        let cache = CacheStore::new(Arc::new(store.clone()));

        cache.write("weather_x", &1u8, None).await;

        let raw = store.raw("weather_x").expect("Entry should be stored");
        assert!(!raw.contains("\"day\""));
        assert!(raw.contains("\"timestamp\""));
    }

    #[tokio::test]
    async fn test_stale_entries_are_still_readable() {
        let store = MemoryStore::new();
        let old = entry_at(Utc::now() - chrono::Duration::days(30));
        store
            .set("old", serde_json::to_string(&old).expect("Serialize"))
            .await
            .expect("Set should succeed");

        let cache = CacheStore::new(Arc::new(store));
        let entry: CacheEntry<TestData> = cache.read("old").await.expect("Stale entry should be served");

        assert!(!CacheStore::is_fresh(&entry, Duration::from_secs(3600)));
        assert_eq!(entry.data.name, "ttl");
    }

    #[tokio::test]
    async fn test_corrupt_entry_reads_as_absent() {
        let store = MemoryStore::new();
        store
            .set("digest", "{not json".to_string())
            .await
            .expect("Set should succeed");

        let cache = CacheStore::new(Arc::new(store));
        let result: Option<CacheEntry<TestData>> = cache.read("digest").await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_broken_medium_is_swallowed() {
        let cache = CacheStore::new(Arc::new(BrokenStore));

        cache.write("digest", &1u8, None).await;
        let result: Option<CacheEntry<u8>> = cache.read("digest").await;

        assert!(result.is_none());
    }

    #[test]
    fn test_ttl_boundary() {
        let now = Utc::now();
        let ttl = Duration::from_secs(30 * 60);
        let ttl_chrono = chrono::Duration::minutes(30);
        let one_ms = chrono::Duration::milliseconds(1);

        let stale = entry_at(now - ttl_chrono - one_ms);
        let fresh = entry_at(now - ttl_chrono + one_ms);
        let exact = entry_at(now - ttl_chrono);

        assert!(!CacheStore::is_fresh_at(&stale, ttl, now));
        assert!(CacheStore::is_fresh_at(&fresh, ttl, now));
        assert!(!CacheStore::is_fresh_at(&exact, ttl, now));
    }

    #[test]
    fn test_future_timestamp_is_stale() {
        let now = Utc::now();
        let ttl = Duration::from_secs(30 * 60);

        let ahead = entry_at(now + chrono::Duration::minutes(5));
        let same_instant = entry_at(now);

        assert!(!CacheStore::is_fresh_at(&ahead, ttl, now));
        assert!(CacheStore::is_fresh_at(&same_instant, ttl, now));
    }

    #[tokio::test]
    async fn test_overwrite_existing_entry() {
        let (cache, _temp_dir) = create_test_cache();

        cache.write("key", &1u32, None).await;
        cache.write("key", &2u32, Some("2026-01-01")).await;

        let entry: CacheEntry<u32> = cache.read("key").await.expect("Should read cache");
        assert_eq!(entry.data, 2);
        assert_eq!(entry.day.as_deref(), Some("2026-01-01"));
    }
}

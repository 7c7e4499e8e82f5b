//! Persistence media for cached feed data
//!
//! A `KeyValueStore` maps string keys to string values. `FileStore` keeps one
//! JSON file per key in an XDG-compliant cache directory; `MemoryStore` keeps
//! everything in process memory and is used when no cache directory exists
//! and in tests.

use async_trait::async_trait;
use directories::ProjectDirs;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use thiserror::Error;
use url::form_urlencoded::byte_serialize;

/// Errors raised by a persistence medium
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the medium failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A string key/value medium with per-key atomic replacement
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if there is none
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replaces the value stored under `key`
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
}

/// Stores each key as `<key>.json` inside a cache directory
///
/// Uses `~/.cache/tabfeeds/` on Linux, or the platform equivalent.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a FileStore in the XDG cache directory
    ///
    /// Returns `None` if the directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "tabfeeds")?;
        Some(Self {
            dir: project_dirs.cache_dir().to_path_buf(),
        })
    }

    /// Creates a FileStore rooted at a custom directory
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory the files live in
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // Each write gets its own temp file, so concurrent writers of one key
        // never share a path and readers only see a complete file.
        let dir = self.dir.clone();
        let target = self.path(key);
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(value.as_bytes())?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
    }
}

/// Maps a key to a file-name-safe stem
///
/// Percent-encoding keeps distinct keys on distinct files.
fn sanitize_key(key: &str) -> String {
    byte_serialize(key.as_bytes()).collect()
}

/// Process-local store
///
/// Clones share the same contents. Counts writes so callers can observe how
/// often the medium was touched.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls since creation
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Stored value for `key`, read without going through the async interface
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "memory store poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "memory store poisoned"))?;
        entries.insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens the best available medium
///
/// Prefers a `FileStore` in `dir` (or the XDG cache directory when `dir` is
/// `None`); falls back to a `MemoryStore` when no directory can be determined.
pub fn open_default_store(dir: Option<PathBuf>) -> Arc<dyn KeyValueStore> {
    match dir.map(FileStore::with_dir).or_else(FileStore::new) {
        Some(store) => {
            log::debug!("using file cache at {}", store.dir().display());
            Arc::new(store)
        }
        None => {
            log::warn!("no cache directory available, falling back to in-memory cache");
            Arc::new(MemoryStore::new())
        }
    }
}

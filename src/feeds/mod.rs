//! Feed adapters
//!
//! A `FeedSource` knows how to fetch and normalize one feed family. `Feed`
//! wraps a source with the shared caching behavior: serve whatever is cached
//! first, decide whether a refresh is warranted, write through on change and
//! keep the stale entry when every upstream fails.

pub mod digest;
pub mod wallpaper;
pub mod weather;

pub use digest::{Digest, DigestSource};
pub use wallpaper::{Wallpaper, WallpaperSource};
pub use weather::{Weather, WeatherSource};

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheEntry, CacheStore};
use crate::error::{FeedError, FetchError};
use crate::fetch::FetchOrchestrator;

/// What a consumer receives for one feed region
pub type FeedResult<T> = Result<T, FeedError>;

/// A freshly fetched, normalized payload
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub payload: T,
    /// Calendar day the upstream dates this payload to, as `YYYY-MM-DD`
    pub day: Option<String>,
}

impl<T> Fetched<T> {
    pub fn new(payload: T, day: Option<String>) -> Self {
        Self { payload, day }
    }
}

/// Outcome of a refresh that reached an upstream
#[derive(Debug, Clone, PartialEq)]
pub enum Refreshed<T> {
    /// The payload differs from the cache and was written
    Updated(T),
    /// The payload is byte-identical to the cached one; nothing was written
    Unchanged(T),
}

/// Per-feed fetching and normalization
#[async_trait]
pub trait FeedSource: Send + Sync {
    type Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Feed family name, also the preferred-instance key
    fn family(&self) -> &'static str;

    fn cache_key(&self) -> String;

    fn ttl(&self) -> Duration;

    /// Fetches and normalizes a payload, failing over as the feed requires
    async fn fetch(&self, orchestrator: &FetchOrchestrator) -> Result<Fetched<Self::Payload>, FetchError>;

    /// Called after a changed payload has been written to the cache
    async fn on_refreshed(&self, _payload: &Self::Payload, _cache: &CacheStore) {}
}

/// A feed source bound to its cache and the shared orchestrator
pub struct Feed<S: FeedSource> {
    source: S,
    cache: CacheStore,
    orchestrator: Arc<FetchOrchestrator>,
}

impl<S: FeedSource> Feed<S> {
    pub fn new(source: S, cache: CacheStore, orchestrator: Arc<FetchOrchestrator>) -> Self {
        Self {
            source,
            cache,
            orchestrator,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The cached entry, whatever its age
    pub async fn cached(&self) -> Option<CacheEntry<S::Payload>> {
        self.cache.read(&self.source.cache_key()).await
    }

    /// Whether a refresh should be attempted
    ///
    /// True when forced, when nothing is cached, when the entry is older than
    /// the feed's TTL, or when the entry's logical day is not `today`.
    pub fn needs_refresh(&self, entry: Option<&CacheEntry<S::Payload>>, force: bool, today: &str) -> bool {
        let Some(entry) = entry else {
            return true;
        };
        if force || !CacheStore::is_fresh(entry, self.source.ttl()) {
            return true;
        }
        matches!(&entry.day, Some(day) if day != today)
    }

    /// Fetches once and writes through unless the payload is unchanged
    pub async fn refresh(
        &self,
        previous: Option<&CacheEntry<S::Payload>>,
    ) -> Result<Refreshed<S::Payload>, FetchError> {
        let fetched = self.source.fetch(&self.orchestrator).await?;

        if let Some(previous) = previous {
            if same_bytes(&previous.data, &fetched.payload) {
                log::debug!("{}: upstream unchanged, skipping cache write", self.source.family());
                return Ok(Refreshed::Unchanged(fetched.payload));
            }
        }

        self.cache
            .write(&self.source.cache_key(), &fetched.payload, fetched.day.as_deref())
            .await;
        self.source.on_refreshed(&fetched.payload, &self.cache).await;
        Ok(Refreshed::Updated(fetched.payload))
    }

    /// Serves the feed with stale-while-revalidate semantics
    ///
    /// `notify` is called with the cached payload before any network activity,
    /// again with the refreshed payload if it changed, and with an error only
    /// when the refresh failed and nothing was cached. Returns the best data
    /// available once the refresh settles.
    pub async fn load<F>(&self, force: bool, mut notify: F) -> FeedResult<S::Payload>
    where
        F: FnMut(FeedResult<S::Payload>) + Send,
    {
        let entry = self.cached().await;
        if let Some(entry) = &entry {
            notify(Ok(entry.data.clone()));
        }

        if !self.needs_refresh(entry.as_ref(), force, &today()) {
            log::debug!("{}: serving fresh cache", self.source.family());
            if let Some(entry) = entry {
                return Ok(entry.data);
            }
        }

        match self.refresh(entry.as_ref()).await {
            Ok(Refreshed::Updated(payload)) => {
                notify(Ok(payload.clone()));
                Ok(payload)
            }
            Ok(Refreshed::Unchanged(payload)) => Ok(payload),
            Err(source) => {
                let err = FeedError::Unavailable {
                    feed: self.source.family(),
                    source,
                };
                match entry {
                    Some(entry) => {
                        log::warn!("{}; keeping cached data", err);
                        Ok(entry.data)
                    }
                    None => {
                        log::error!("{}", err);
                        notify(Err(err.clone()));
                        Err(err)
                    }
                }
            }
        }
    }
}

/// Compares two payloads by their serialized bytes
fn same_bytes<T: Serialize>(a: &T, b: &T) -> bool {
    match (serde_json::to_vec(a), serde_json::to_vec(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Today's date in the local timezone, as `YYYY-MM-DD`
pub fn today() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Normalizes an upstream date to `YYYY-MM-DD`
///
/// Accepts `2026-01-05`, `20260105`, `2026/1/5`, `2026.01.05`,
/// `2026年1月5日` and date-times whose date part is one of those.
pub fn normalize_day(raw: &str) -> Option<String> {
    let date_part = raw.trim().split(['T', ' ']).next()?;
    const FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日"];

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
}

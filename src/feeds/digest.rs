//! Daily news digest
//!
//! Fetched from `{mirror}/v2/60s`. There is no secondary provider: when every
//! mirror fails the cached digest stays in place. A successful refresh also
//! stores the digest's tip as the page subtitle for a day.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::{normalize_day, Feed, FeedSource, Fetched};
use crate::cache::{CacheEntry, CacheStore};
use crate::config::FeedsConfig;
use crate::error::FetchError;
use crate::fetch::{mirror_data, FetchOrchestrator};
use crate::text::repair_mis_decoded;

const FAMILY: &str = "digest";

/// Cache key of the subtitle tip derived from the digest
pub const SUBTITLE_TIP_KEY: &str = "subtitle_tip";

/// Normalized digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub date: String,
    pub day_of_week: String,
    pub lunar_date: String,
    pub cover: String,
    pub tip: String,
    pub link: String,
    pub news: Vec<String>,
}

/// Mirror response body (`data` object)
#[derive(Debug, Deserialize)]
struct Mirror60s {
    #[serde(default)]
    date: String,
    #[serde(default)]
    day_of_week: String,
    #[serde(default)]
    lunar_date: String,
    #[serde(default, alias = "image")]
    cover: String,
    #[serde(default)]
    tip: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    news: Vec<NewsItem>,
}

/// News entries are plain strings on most mirrors, objects on some
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NewsItem {
    Text(String),
    Entry { title: String },
}

impl NewsItem {
    fn into_text(self) -> String {
        match self {
            NewsItem::Text(text) => text,
            NewsItem::Entry { title } => title,
        }
    }
}

/// Fetches the digest from the mirror pool
#[derive(Debug, Clone)]
pub struct DigestSource {
    ttl: Duration,
    tip_ttl: Duration,
    timeout: Duration,
}

impl DigestSource {
    pub fn new(config: &FeedsConfig) -> Self {
        Self {
            ttl: config.digest_ttl,
            tip_ttl: config.tip_ttl,
            timeout: config.feed_timeout,
        }
    }
}

#[async_trait]
impl FeedSource for DigestSource {
    type Payload = Digest;

    fn family(&self) -> &'static str {
        FAMILY
    }

    fn cache_key(&self) -> String {
        FAMILY.to_string()
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn fetch(&self, orchestrator: &FetchOrchestrator) -> Result<Fetched<Digest>, FetchError> {
        orchestrator
            .fetch_with_failover(FAMILY, |base| format!("{}/v2/60s", base), parse_mirror, self.timeout, None)
            .await
    }

    async fn on_refreshed(&self, payload: &Digest, cache: &CacheStore) {
        if !payload.tip.trim().is_empty() {
            cache.write(SUBTITLE_TIP_KEY, &payload.tip, None).await;
        }
    }
}

impl Feed<DigestSource> {
    /// The subtitle tip, if one was stored within the last day
    pub async fn subtitle_tip(&self) -> Option<String> {
        let entry: CacheEntry<String> = self.cache.read(SUBTITLE_TIP_KEY).await?;
        CacheStore::is_fresh(&entry, self.source.tip_ttl).then_some(entry.data)
    }
}

/// Validates and normalizes a mirror response
fn parse_mirror(body: Value) -> Result<Fetched<Digest>, FetchError> {
    let raw: Mirror60s = serde_json::from_value(mirror_data(body)?)?;

    let news: Vec<String> = raw
        .news
        .into_iter()
        .map(|item| repair_mis_decoded(item.into_text().trim()))
        .filter(|item| !item.is_empty())
        .collect();
    if news.is_empty() {
        return Err(FetchError::rejected("empty news"));
    }

    let day = normalize_day(&raw.date);
    let digest = Digest {
        date: day.clone().unwrap_or_else(|| raw.date.clone()),
        day_of_week: repair_mis_decoded(&raw.day_of_week),
        lunar_date: repair_mis_decoded(&raw.lunar_date),
        cover: raw.cover,
        tip: repair_mis_decoded(&raw.tip),
        link: raw.link,
        news,
    };
    Ok(Fetched::new(digest, day))
}

//! Concurrent feed loading
//!
//! Launches one tokio task per selected feed and forwards every result the
//! feed delivers (cached copy first, refreshed copy later) to the consumer
//! over a channel.

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::cache::{CacheStore, KeyValueStore};
use crate::config::FeedsConfig;
use crate::feeds::{Digest, DigestSource, Feed, FeedResult, Wallpaper, WallpaperSource, Weather, WeatherSource};
use crate::fetch::FetchOrchestrator;
use crate::instances::InstanceDirectory;

/// Feed families a consumer can select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum FeedKind {
    Wallpaper,
    Digest,
    Weather,
}

impl FeedKind {
    pub const ALL: [FeedKind; 3] = [FeedKind::Wallpaper, FeedKind::Digest, FeedKind::Weather];

    pub fn name(self) -> &'static str {
        match self {
            FeedKind::Wallpaper => "wallpaper",
            FeedKind::Digest => "digest",
            FeedKind::Weather => "weather",
        }
    }
}

/// Messages sent from the feed tasks to the consumer
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshMessage {
    WallpaperUpdated(FeedResult<Wallpaper>),
    DigestUpdated(FeedResult<Digest>),
    /// Sent once the digest settles; `None` means the default subtitle applies
    SubtitleTip(Option<String>),
    WeatherUpdated(FeedResult<Weather>),
    /// Every feed task has finished
    RefreshCompleted,
}

impl RefreshMessage {
    /// Feed the message belongs to, `None` for the completion marker
    pub fn feed(&self) -> Option<&'static str> {
        match self {
            RefreshMessage::WallpaperUpdated(_) => Some(FeedKind::Wallpaper.name()),
            RefreshMessage::DigestUpdated(_) => Some(FeedKind::Digest.name()),
            RefreshMessage::SubtitleTip(_) => Some("subtitle_tip"),
            RefreshMessage::WeatherUpdated(_) => Some(FeedKind::Weather.name()),
            RefreshMessage::RefreshCompleted => None,
        }
    }

    /// One JSON object per message, as printed by the binary
    pub fn to_json(&self) -> Value {
        let feed = self.feed();
        match self {
            RefreshMessage::WallpaperUpdated(result) => result_json(feed, result),
            RefreshMessage::DigestUpdated(result) => result_json(feed, result),
            RefreshMessage::WeatherUpdated(result) => result_json(feed, result),
            RefreshMessage::SubtitleTip(tip) => json!({"feed": feed, "ok": true, "data": tip}),
            RefreshMessage::RefreshCompleted => json!({"done": true}),
        }
    }
}

fn result_json<T: Serialize>(feed: Option<&str>, result: &FeedResult<T>) -> Value {
    match result {
        Ok(data) => json!({"feed": feed, "ok": true, "data": data}),
        Err(e) => json!({
            "feed": feed,
            "ok": false,
            "error": e.kind(),
            "message": e.idle_message(),
        }),
    }
}

/// The feeds selected for one run, sharing a store and an orchestrator
pub struct FeedSet {
    pub wallpaper: Option<Arc<Feed<WallpaperSource>>>,
    pub digest: Option<Arc<Feed<DigestSource>>>,
    pub weather: Option<Arc<Feed<WeatherSource>>>,
}

impl FeedSet {
    /// Builds the selected feeds
    ///
    /// Weather is skipped with a warning when no city is configured.
    pub fn new(config: &FeedsConfig, store: Arc<dyn KeyValueStore>, kinds: &[FeedKind]) -> Self {
        let cache = CacheStore::new(store.clone());
        let directory = InstanceDirectory::new(config.mirrors.clone(), store);
        let orchestrator = Arc::new(FetchOrchestrator::new(directory));

        let wallpaper = kinds
            .contains(&FeedKind::Wallpaper)
            .then(|| Arc::new(Feed::new(WallpaperSource::new(config), cache.clone(), orchestrator.clone())));
        let digest = kinds
            .contains(&FeedKind::Digest)
            .then(|| Arc::new(Feed::new(DigestSource::new(config), cache.clone(), orchestrator.clone())));

        let weather = match (&config.city, kinds.contains(&FeedKind::Weather)) {
            (Some(city), true) => Some(Arc::new(Feed::new(
                WeatherSource::new(city.clone(), config),
                cache.clone(),
                orchestrator.clone(),
            ))),
            (None, true) => {
                log::warn!("weather requested but no city configured, skipping");
                None
            }
            _ => None,
        };

        Self {
            wallpaper,
            digest,
            weather,
        }
    }
}

/// Handle for receiving feed results
pub struct RefreshHandle {
    /// Channel for receiving refresh messages
    pub receiver: mpsc::UnboundedReceiver<RefreshMessage>,
}

impl RefreshHandle {
    /// Spawns one load task per feed in `feeds`
    ///
    /// # Arguments
    /// * `feeds` - The feeds to load
    /// * `force` - Refresh even when the cache is fresh
    ///
    /// # Returns
    /// A RefreshHandle whose channel ends with `RefreshCompleted`
    pub fn spawn(feeds: FeedSet, force: bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut tasks = Vec::new();

        if let Some(feed) = feeds.wallpaper {
            let tx = tx.clone();
            tasks.push(tokio::spawn(async move {
                let _ = feed
                    .load(force, |r| {
                        let _ = tx.send(RefreshMessage::WallpaperUpdated(r));
                    })
                    .await;
            }));
        }

        if let Some(feed) = feeds.digest {
            let tx = tx.clone();
            tasks.push(tokio::spawn(async move {
                let loaded = feed
                    .load(force, |r| {
                        let _ = tx.send(RefreshMessage::DigestUpdated(r));
                    })
                    .await;
                let tip = match loaded {
                    Ok(_) => feed.subtitle_tip().await,
                    Err(_) => None,
                };
                let _ = tx.send(RefreshMessage::SubtitleTip(tip));
            }));
        }

        if let Some(feed) = feeds.weather {
            let tx = tx.clone();
            tasks.push(tokio::spawn(async move {
                let _ = feed
                    .load(force, |r| {
                        let _ = tx.send(RefreshMessage::WeatherUpdated(r));
                    })
                    .await;
            }));
        }

        tokio::spawn(async move {
            for task in futures::future::join_all(tasks).await {
                if let Err(e) = task {
                    log::error!("feed task panicked: {}", e);
                }
            }
            let _ = tx.send(RefreshMessage::RefreshCompleted);
        });

        Self { receiver: rx }
    }

    /// Waits for the next message; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<RefreshMessage> {
        self.receiver.recv().await
    }

    /// Checks for a pending message without blocking
    pub fn try_recv(&mut self) -> Option<RefreshMessage> {
        self.receiver.try_recv().ok()
    }
}

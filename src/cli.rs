//! Command-line interface parsing for tabfeeds
//!
//! Flags override the environment-derived `FeedsConfig` and choose which
//! feeds to load.

use clap::Parser;
use std::path::PathBuf;

use crate::config::FeedsConfig;
use crate::refresh::FeedKind;

/// tabfeeds - Load start-page feeds with mirror failover and a local cache
#[derive(Parser, Debug)]
#[command(name = "tabfeeds")]
#[command(about = "Start-page feeds (wallpaper, digest, weather) with mirror failover and caching")]
#[command(version)]
pub struct Cli {
    /// Refresh every feed even when its cache is fresh
    #[arg(long)]
    pub force: bool,

    /// City for the weather feed (overrides TABFEEDS_CITY)
    #[arg(long, value_name = "CITY")]
    pub city: Option<String>,

    /// Consumer locale, e.g. zh-CN or en-US (overrides TABFEEDS_LOCALE)
    #[arg(long, value_name = "LOCALE")]
    pub locale: Option<String>,

    /// Load only these feeds
    ///
    /// Examples:
    ///   tabfeeds --only digest
    ///   tabfeeds --only wallpaper --only weather --city Berlin
    #[arg(long, value_enum, value_name = "FEED")]
    pub only: Vec<FeedKind>,

    /// Directory for cached feeds and preferred mirrors
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Configuration derived from CLI arguments for startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub feeds: FeedsConfig,
    pub kinds: Vec<FeedKind>,
    pub force: bool,
    pub cache_dir: Option<PathBuf>,
}

impl StartupConfig {
    /// Merges CLI flags over `base`
    ///
    /// Without `--only` every feed is selected.
    pub fn from_cli(cli: &Cli, base: FeedsConfig) -> Self {
        let mut feeds = base;
        if let Some(city) = cli.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            feeds.city = Some(city.to_string());
        }
        if let Some(locale) = cli.locale.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            feeds.locale = locale.to_string();
        }

        let mut kinds = if cli.only.is_empty() {
            FeedKind::ALL.to_vec()
        } else {
            cli.only.clone()
        };
        let mut seen = Vec::new();
        kinds.retain(|k| {
            let fresh = !seen.contains(k);
            seen.push(*k);
            fresh
        });

        StartupConfig {
            feeds,
            kinds,
            force: cli.force,
            cache_dir: cli.cache_dir.clone(),
        }
    }
}

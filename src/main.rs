//! tabfeeds - Load start-page feeds from the command line
//!
//! Plays the consuming page: loads the selected feeds concurrently and prints
//! every result as one JSON line, cached data first and fresh data as it
//! arrives.

use clap::Parser;
use std::io::{self, Write};

use tabfeeds::cache::open_default_store;
use tabfeeds::cli::{Cli, StartupConfig};
use tabfeeds::config::FeedsConfig;
use tabfeeds::refresh::{FeedSet, RefreshHandle, RefreshMessage};

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let startup = StartupConfig::from_cli(&cli, FeedsConfig::from_env());
    log::debug!(
        "loading {:?} (locale {}, {} mirrors)",
        startup.kinds,
        startup.feeds.locale,
        startup.feeds.mirrors.len()
    );

    let store = open_default_store(startup.cache_dir.clone());
    let feeds = FeedSet::new(&startup.feeds, store, &startup.kinds);
    let mut handle = RefreshHandle::spawn(feeds, startup.force);

    let mut stdout = io::stdout().lock();
    let mut failed = false;
    while let Some(message) = handle.recv().await {
        if message == RefreshMessage::RefreshCompleted {
            break;
        }
        let line = message.to_json();
        failed |= line["ok"] == false;
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;
    }

    if failed {
        log::warn!("at least one feed had no data to show");
    }
    Ok(())
}

//! tabfeeds library
//!
//! Resilient acquisition of start-page feeds: a mirror pool with a remembered
//! preferred instance, a secondary provider per feed, and a persisted
//! stale-while-revalidate cache.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod feeds;
pub mod fetch;
pub mod instances;
pub mod refresh;
pub mod text;

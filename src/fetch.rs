//! Failover fetching across the mirror pool
//!
//! `FetchOrchestrator` walks the attempt order produced by the
//! `InstanceDirectory` one candidate at a time, stops at the first response
//! that validates, remembers that candidate, and runs the feed's secondary
//! provider once if the whole pool fails.

use futures::future::BoxFuture;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::FetchError;
use crate::instances::InstanceDirectory;

/// Lazily-started secondary provider request
///
/// Not polled unless every pool candidate has failed.
pub type Secondary<'a, T> = BoxFuture<'a, Result<T, FetchError>>;

/// Executes bounded, ordered attempt sequences
#[derive(Debug, Clone)]
pub struct FetchOrchestrator {
    client: Client,
    directory: InstanceDirectory,
}

impl FetchOrchestrator {
    pub fn new(directory: InstanceDirectory) -> Self {
        Self::with_client(Client::new(), directory)
    }

    /// Create an orchestrator with a custom HTTP client
    pub fn with_client(client: Client, directory: InstanceDirectory) -> Self {
        Self { client, directory }
    }

    pub fn directory(&self) -> &InstanceDirectory {
        &self.directory
    }

    /// Issues one GET to `url` and parses the body as JSON
    ///
    /// The whole exchange, body included, is cancelled when `timeout` elapses.
    pub async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, FetchError> {
        let attempt = async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }
            let text = response.text().await?;
            Ok(serde_json::from_str::<Value>(&text)?)
        };

        match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    /// Fetches from the first candidate whose response validates
    ///
    /// # Arguments
    /// * `family` - Feed family, used to look up and record the preferred instance
    /// * `path` - Builds the full URL from a candidate base address
    /// * `validate` - Checks and normalizes a parsed body
    /// * `timeout` - Bound for each individual attempt
    /// * `secondary` - Provider tried once after the pool is exhausted
    ///
    /// # Returns
    /// * `Ok(T)` - The normalized payload of the first valid response
    /// * `Err(FetchError::AllCandidatesExhausted)` - Carrying the last error seen
    pub async fn fetch_with_failover<T, P, V>(
        &self,
        family: &str,
        path: P,
        validate: V,
        timeout: Duration,
        secondary: Option<Secondary<'_, T>>,
    ) -> Result<T, FetchError>
    where
        P: Fn(&str) -> String,
        V: Fn(Value) -> Result<T, FetchError>,
    {
        let current = self.directory.preferred(family).await;
        let order = self.directory.attempt_order(family).await;
        let mut last_error = None;

        for base in &order {
            let url = path(base);
            log::debug!("{}: trying {}", family, url);

            let outcome = match self.get_json(&url, timeout).await {
                Ok(body) => validate(body),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(payload) => {
                    if current.as_deref() != Some(base.as_str()) {
                        log::info!("{}: switching preferred instance to {}", family, base);
                        self.directory.set_preferred(family, base).await;
                    }
                    return Ok(payload);
                }
                Err(e) => {
                    log::warn!("{}: {} failed: {}", family, base, e);
                    last_error = Some(e);
                }
            }
        }

        if let Some(secondary) = secondary {
            log::debug!("{}: mirror pool exhausted, trying secondary provider", family);
            match secondary.await {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    log::warn!("{}: secondary provider failed: {}", family, e);
                    last_error = Some(e);
                }
            }
        }

        let last = last_error.unwrap_or_else(|| FetchError::rejected("no candidates configured"));
        Err(FetchError::AllCandidatesExhausted(Box::new(last)))
    }
}

/// Reads the feed-level status code of a mirror response
///
/// Mirrors wrap every payload as `{"code": 200, "data": {...}}`; anything
/// else is rejected.
pub fn mirror_data(mut body: Value) -> Result<Value, FetchError> {
    let code = body
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| FetchError::malformed("missing numeric 'code'"))?;
    if code != 200 {
        return Err(FetchError::rejected(format!("code {}", code)));
    }
    match body.get_mut("data").map(Value::take) {
        Some(data) if data.is_object() => Ok(data),
        _ => Err(FetchError::malformed("missing 'data' object")),
    }
}

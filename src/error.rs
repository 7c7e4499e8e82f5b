//! Error types for feed acquisition
//!
//! `FetchError` describes why a single upstream attempt (or a whole failover
//! run) failed. `FeedError` is what a feed adapter hands to its consumer when
//! it has no cached data to fall back on.

use thiserror::Error;

/// Errors that can occur while fetching from an upstream endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network unreachable, connection reset, DNS failure and similar
    #[error("transport failure: {0}")]
    Transport(String),

    /// The attempt exceeded its time bound and was cancelled
    #[error("request timed out")]
    Timeout,

    /// The upstream answered with a non-success HTTP status
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// The body was not the JSON structure we expected
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The payload parsed but the upstream reported failure or a required field was empty
    #[error("upstream rejected: {0}")]
    UpstreamRejected(String),

    /// Every candidate and the secondary provider failed
    #[error("all candidates exhausted, last error: {0}")]
    AllCandidatesExhausted(Box<FetchError>),
}

impl FetchError {
    /// Creates a malformed-response error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// Creates an upstream-rejected error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::UpstreamRejected(message.into())
    }

    /// Stable short name of the error kind, used in consumer-facing output
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport_failure",
            FetchError::Timeout => "timeout",
            FetchError::HttpStatus(_) => "http_status_failure",
            FetchError::MalformedResponse(_) => "malformed_response",
            FetchError::UpstreamRejected(_) => "upstream_rejected",
            FetchError::AllCandidatesExhausted(_) => "all_candidates_exhausted",
        }
    }

    /// The innermost error, looking through `AllCandidatesExhausted`
    pub fn root(&self) -> &FetchError {
        match self {
            FetchError::AllCandidatesExhausted(last) => last.root(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus(status.as_u16())
        } else if err.is_decode() {
            FetchError::MalformedResponse(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::MalformedResponse(err.to_string())
    }
}

/// Failure reported by a feed adapter to its consumer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// No upstream could be reached and nothing was cached
    #[error("{feed} unavailable: {source}")]
    Unavailable {
        feed: &'static str,
        #[source]
        source: FetchError,
    },
}

impl FeedError {
    /// Whether the last failed attempt was a timeout
    pub fn is_timeout(&self) -> bool {
        match self {
            FeedError::Unavailable { source, .. } => *source.root() == FetchError::Timeout,
        }
    }

    /// Stable short name of the underlying failure
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::Unavailable { source, .. } => source.root().kind(),
        }
    }

    /// Text a consumer can show in the feed's own display region
    pub fn idle_message(&self) -> &'static str {
        if self.is_timeout() {
            "The service is responding slowly, try again later"
        } else {
            "Unable to load right now"
        }
    }
}

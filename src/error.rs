//! Failure taxonomy for the harvesting pipeline.
//!
//! Everything that can go wrong while processing one feed or one entry is a
//! recoverable value the caller must branch on:
//!
//! - [`FetchError`]: network/HTTP failure after the fetch-layer retry policy
//! - [`ParseError`]: unparseable date or feed document
//! - [`ExtractionError`]: best-effort full-article extraction failed
//!
//! Only [`ConfigError`] (and output write errors, surfaced as `std::io::Error`)
//! end a run.

use std::time::Duration;
use thiserror::Error;

/// A failed HTTP read.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP status {status}")]
    Status {
        status: u16,
        retry_after: Option<Duration>,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP client could not be built: {0}")]
    Client(String),
}

impl FetchError {
    /// Whether the retry policy may try the same request again.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            FetchError::Transport(_) => true,
            FetchError::InvalidUrl { .. } | FetchError::Client(_) => false,
        }
    }

    /// Server-supplied `Retry-After` hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            FetchError::Client(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unparseable date {0:?}")]
    Date(String),

    #[error("malformed feed: {0}")]
    Feed(String),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("article fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("no readable content found")]
    NoContent,
}

/// Fatal configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown timezone {name:?}: {reason}")]
    Timezone { name: String, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        for status in [429, 500, 502, 503, 504] {
            let err = FetchError::Status { status, retry_after: None };
            assert!(err.is_transient(), "{status} should be retried");
        }
        for status in [400, 401, 403, 404, 410] {
            let err = FetchError::Status { status, retry_after: None };
            assert!(!err.is_transient(), "{status} should not be retried");
        }
    }

    #[test]
    fn test_transport_is_transient_invalid_url_is_not() {
        assert!(FetchError::Transport("reset".into()).is_transient());
        let err = FetchError::InvalidUrl {
            url: "nope".into(),
            reason: "relative URL without a base".into(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_retry_after_only_on_status() {
        let err = FetchError::Status {
            status: 429,
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(FetchError::Transport("x".into()).retry_after(), None);
    }
}

//! Fetch failure classification.

use thiserror::Error;

/// Why a metric query produced no sample.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The backend rate-limited the request. Not retried within the tick.
    #[error("throttled: {0}")]
    Throttled(String),

    /// No datapoints for this resource/dimension combination.
    #[error("no data: {0}")]
    NotFound(String),

    /// Network failure, timeout, or unreadable response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend rejected the request for another reason.
    #[error("backend error: {0}")]
    Backend(String),
}

impl QueryError {
    /// Stable label for logs and failure counters.
    pub fn reason(&self) -> &'static str {
        match self {
            QueryError::Throttled(_) => "throttled",
            QueryError::NotFound(_) => "not_found",
            QueryError::Transport(_) => "transport",
            QueryError::Backend(_) => "backend",
        }
    }

    /// Transient failures leave the cached sample in place, marked stale.
    pub fn is_transient(&self) -> bool {
        !matches!(self, QueryError::NotFound(_))
    }
}

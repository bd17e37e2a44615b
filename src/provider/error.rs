//! Provider failure taxonomy.
//!
//! A provider call has three possible shapes:
//!
//! | Shape                       | Type                              | Aggregate run treats it as |
//! |-----------------------------|-----------------------------------|----------------------------|
//! | answer                      | `Ok(Reply::Found(v))`             | facet present              |
//! | graceful "no valid answer"  | `Ok(Reply::Declined { reason })`  | facet absent               |
//! | operational failure         | `Err(ProviderError)`              | facet failed, run fails    |
//!
//! Transient errors ([`ProviderError::is_retryable`]) are retried inside the
//! provider by [`crate::provider::RetryPolicy`]; once the attempts run out
//! they surface as [`ProviderError::RetriesExhausted`].

use std::time::Duration;

use thiserror::Error;

use crate::audio::CacheError;

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// Successful provider call: either an answer or a graceful refusal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    /// The provider produced a value.
    Found(T),
    /// The backend determined that no valid answer exists for this input
    /// (content-policy refusal, unknown word, terminal rate limit, …).
    Declined { reason: String },
}

impl<T> Reply<T> {
    pub fn declined(reason: impl Into<String>) -> Self {
        Reply::Declined {
            reason: reason.into(),
        }
    }

    /// Convert to an `Option`, dropping the decline reason.
    pub fn found(self) -> Option<T> {
        match self {
            Reply::Found(v) => Some(v),
            Reply::Declined { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Reply::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        match self {
            Reply::Found(v) => Reply::Found(f(v)),
            Reply::Declined { reason } => Reply::Declined { reason },
        }
    }
}

/// Result type returned by every facet method.
pub type ProviderResult<T> = Result<Reply<T>, ProviderError>;

// ---------------------------------------------------------------------------
// ProviderError
// ---------------------------------------------------------------------------

/// Operational failures of a provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP transport or connection error.
    #[error("request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The backend asked us to slow down.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The backend answered with an unexpected HTTP status.
    #[error("backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response could not be parsed.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The response parsed but contained nothing usable.
    #[error("backend returned an empty response")]
    EmptyResponse,

    /// The provider was asked for something it cannot do with its
    /// configuration (missing API key, missing directory, …).
    #[error("provider misconfigured: {0}")]
    Config(String),

    /// Local file I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio caching / normalisation failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A transient failure persisted through every retry.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ProviderError>,
    },

    /// The provider task panicked or was aborted.
    #[error("provider task failed: {0}")]
    Task(String),
}

impl ProviderError {
    /// Errors worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Request(_) | ProviderError::Timeout | ProviderError::RateLimited { .. }
        )
    }

    /// `true` for [`ProviderError::RetriesExhausted`].
    pub fn is_exhausted_retry(&self) -> bool {
        matches!(self, ProviderError::RetriesExhausted { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::Parse(e.to_string())
        } else {
            ProviderError::Request(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Parse(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::Request("reset".into()).is_retryable());
        assert!(ProviderError::RateLimited { retry_after: None }.is_retryable());
    }

    #[test]
    fn fatal_errors_are_not_retryable() {
        assert!(!ProviderError::Auth("bad key".into()).is_retryable());
        assert!(!ProviderError::Parse("bad json".into()).is_retryable());
        assert!(!ProviderError::EmptyResponse.is_retryable());
        let exhausted = ProviderError::RetriesExhausted {
            attempts: 3,
            last: Box::new(ProviderError::Timeout),
        };
        assert!(!exhausted.is_retryable());
        assert!(exhausted.is_exhausted_retry());
    }

    #[test]
    fn exhausted_message_names_last_error() {
        let err = ProviderError::RetriesExhausted {
            attempts: 4,
            last: Box::new(ProviderError::RateLimited { retry_after: None }),
        };
        let msg = err.to_string();
        assert!(msg.contains("4 attempts"));
        assert!(msg.contains("rate limited"));
    }

    #[test]
    fn reply_helpers() {
        let found: Reply<u8> = Reply::Found(3);
        assert!(found.is_found());
        assert_eq!(found.clone().map(|v| v * 2), Reply::Found(6));
        assert_eq!(found.found(), Some(3));

        let declined: Reply<u8> = Reply::declined("not in dictionary");
        assert!(!declined.is_found());
        assert_eq!(declined.found(), None);
    }
}

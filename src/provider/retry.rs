//! Bounded retry with exponential backoff for transient provider failures.
//!
//! Providers wrap each backend call in [`RetryPolicy::run`].  Only errors for
//! which [`ProviderError::is_retryable`] is true are retried; everything else
//! returns immediately.  When the attempts are used up the last error is
//! wrapped in [`ProviderError::RetriesExhausted`] so callers (and the logs)
//! can tell an exhausted retry apart from a plain fatal error.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;

use super::error::ProviderError;

/// Retry parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.  `1` disables retries.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further attempt.
    pub base_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Backoff before attempt `attempt + 1` (1-based `attempt` that just failed).
    ///
    /// A server-supplied `Retry-After` wins when it is longer, still capped
    /// at `max_delay`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1u32 << exp);
        let wanted = match retry_after {
            Some(hint) if hint > backoff => hint,
            _ => backoff,
        };
        wanted.min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails fatally, or the attempts run out.
    ///
    /// `label` identifies the call in log output (e.g. `"openai/definition"`).
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= self.max_attempts => {
                    if self.max_attempts == 1 {
                        return Err(err);
                    }
                    log::error!("{label}: retries exhausted after {attempt} attempts: {err}");
                    return Err(ProviderError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    let retry_after = match &err {
                        ProviderError::RateLimited { retry_after } => *retry_after,
                        _ => None,
                    };
                    let delay = self.delay_for(attempt, retry_after);
                    log::warn!(
                        "{label}: attempt {attempt}/{} failed ({err}); retrying in {delay:?}",
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! HTTP response classification shared by the remote providers.
//!
//! Maps a non-success response onto the provider failure taxonomy:
//!
//! | Status              | Result                                  |
//! |---------------------|-----------------------------------------|
//! | 429 quota exhausted | `Ok(Declined)`, graceful, not retried   |
//! | 429                 | `Err(RateLimited)`, retried             |
//! | 500, 502, 503, 504  | `Err(Request)`, retried                 |
//! | 401, 403            | `Err(Auth)`, fatal                      |
//! | 400 content policy  | `Ok(Declined)`, graceful                |
//! | anything else       | `Err(Status)`, fatal                    |

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

use super::error::{ProviderError, ProviderResult, Reply};

/// Markers OpenAI-compatible backends put in policy refusals.
const POLICY_MARKERS: &[&str] = &[
    "content_filter",
    "content_policy",
    "content_policy_violation",
    "safety",
];

/// Markers of a 429 that no amount of waiting will clear (account quota or
/// billing limit rather than a request rate).
const QUOTA_MARKERS: &[&str] = &[
    "insufficient_quota",
    "billing_hard_limit",
    "quota exceeded",
    "quota_exceeded",
    "exceeded your current quota",
];

/// `Retry-After` in whole seconds, if present and numeric.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Returns `true` when an error body reads like a content-policy refusal.
pub fn is_policy_refusal(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    POLICY_MARKERS.iter().any(|m| lower.contains(m))
}

/// Returns `true` when a 429 body says the quota is spent.
pub fn is_quota_exhausted(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    QUOTA_MARKERS.iter().any(|m| lower.contains(m))
}

/// Classify a non-success response.  Never returns `Ok(Reply::Found)`.
pub fn classify_failure<T>(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ProviderResult<T> {
    let message: String = body.chars().take(300).collect();
    match status.as_u16() {
        429 if is_quota_exhausted(body) => Ok(Reply::declined(format!(
            "backend quota exhausted: {message}"
        ))),
        429 => Err(ProviderError::RateLimited { retry_after }),
        500 | 502 | 503 | 504 => Err(ProviderError::Request(format!("HTTP {status}: {message}"))),
        401 | 403 => Err(ProviderError::Auth(message)),
        400 if is_policy_refusal(body) => Ok(Reply::declined(format!(
            "backend refused the request: {message}"
        ))),
        code => Err(ProviderError::Status {
            status: code,
            message,
        }),
    }
}

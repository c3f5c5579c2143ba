//! Bounded retry loop with linear, capped backoff.
//!
//! Every attempt re-runs the whole transfer, probe included, so a server
//! whose size or range support changed between attempts is re-read rather
//! than trusted from an earlier answer.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use docfetch_core::download::{FailureType, RetryDecision, RetryPolicy, RetryScope};
//!
//! let policy = RetryPolicy::new(5, Duration::from_secs(2), Duration::from_secs(10), RetryScope::Uniform);
//! match policy.should_retry(FailureType::Permanent, 1) {
//!     RetryDecision::Retry { delay, attempt } => assert_eq!((delay, attempt), (Duration::from_secs(2), 2)),
//!     RetryDecision::DoNotRetry { .. } => unreachable!("uniform scope retries everything"),
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument};

use super::DownloadError;
use super::constants::{BACKOFF_STEP, DEFAULT_MAX_ATTEMPTS, MAX_BACKOFF};

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// May succeed on a later attempt (timeouts, 5xx, range trouble).
    Transient,
    /// Will not change by retrying (404, invalid URL, local disk errors).
    Permanent,
    /// Server asked us to back off (418 / 429).
    RateLimited,
}

/// Which failures the policy is willing to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryScope {
    /// Retry every failure until the budget runs out, 404 included.
    #[default]
    Uniform,
    /// Stop at the first [`FailureType::Permanent`] failure.
    TransientOnly,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep `delay`, then make attempt number `attempt`.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt comes next (1-indexed).
        attempt: u32,
    },
    /// Give up.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Retry budget and backoff shape.
///
/// Delay after failed attempt `n` is `min(backoff_step * n, max_delay)`:
/// linear growth with a ceiling, no jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts including the first.
    max_attempts: u32,
    backoff_step: Duration,
    max_delay: Duration,
    scope: RetryScope,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_step: BACKOFF_STEP,
            max_delay: MAX_BACKOFF,
            scope: RetryScope::Uniform,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        backoff_step: Duration,
        max_delay: Duration,
        scope: RetryScope,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
            max_delay,
            scope,
        }
    }

    /// Creates a policy with a custom attempt budget and default backoff.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns a copy with a different scope.
    #[must_use]
    pub fn scoped(mut self, scope: RetryScope) -> Self {
        self.scope = scope;
        self
    }

    /// Returns the maximum number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the retry scope.
    #[must_use]
    pub fn scope(&self) -> RetryScope {
        self.scope
    }

    /// Decides what happens after attempt `attempt` (1-indexed) failed.
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if self.scope == RetryScope::TransientOnly && failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.delay_after(attempt),
            attempt: attempt + 1,
        }
    }

    /// Backoff slept after failed attempt `attempt`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step
            .saturating_mul(attempt)
            .min(self.max_delay)
    }
}

/// Terminal failure: the retry budget (or scope) ran out.
#[derive(Debug, Error)]
#[error("gave up after {attempts} attempt(s): {last_error}")]
pub struct RetryExhausted {
    /// Attempts actually made.
    pub attempts: u32,
    /// Error from the final attempt.
    #[source]
    pub last_error: DownloadError,
}

/// Runs `attempt_fn` until it succeeds or `policy` gives up.
///
/// `attempt_fn` receives the 1-indexed attempt number. Nothing is cached
/// between calls; each call starts from scratch.
///
/// # Errors
///
/// Returns [`RetryExhausted`] carrying the last attempt's error.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    url: &str,
    mut attempt_fn: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DownloadError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(url, attempt, "attempting download");

        match attempt_fn(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let failure_type = classify_error(&error);
                match policy.should_retry(failure_type, attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next_attempt,
                    } => {
                        info!(
                            url,
                            attempt = next_attempt,
                            max_attempts = policy.max_attempts(),
                            delay_ms = delay.as_millis(),
                            ?failure_type,
                            error = %error,
                            "retrying download"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(url, %reason, "not retrying download");
                        return Err(RetryExhausted {
                            attempts: attempt,
                            last_error: error,
                        });
                    }
                }
            }
        }
    }
}

/// Classifies an error for [`RetryScope::TransientOnly`] and for logging.
///
/// | Error | Type |
/// |-------|------|
/// | Timeout, Network (non-TLS) | Transient |
/// | Network (TLS) | Permanent |
/// | HTTP 408, 416, 5xx | Transient |
/// | HTTP 418, 429 | RateLimited |
/// | other 4xx | Permanent |
/// | RangeNotSatisfiable, RangeMismatch, Integrity | Transient |
/// | Io, InvalidUrl, TooManyRedirects | Permanent |
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { status, .. } => classify_http_status(*status),

        DownloadError::TemporaryBlock { .. } => FailureType::RateLimited,

        DownloadError::Timeout { .. }
        | DownloadError::RangeNotSatisfiable { .. }
        | DownloadError::RangeMismatch { .. }
        | DownloadError::Integrity { .. } => FailureType::Transient,

        DownloadError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }

        DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::TooManyRedirects { .. } => FailureType::Permanent,
    }
}

#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16) -> FailureType {
    match status {
        408 => FailureType::Transient, // Request Timeout
        416 => FailureType::Transient, // Range Not Satisfiable
        418 | 429 => FailureType::RateLimited,
        status if (400..500).contains(&status) => FailureType::Permanent,
        status if (500..600).contains(&status) => FailureType::Transient,
        // 1xx / unexpected 3xx that survived redirect handling
        _ => FailureType::Transient,
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}

//! Exponential backoff for transient collaborator failures.

use std::time::Duration;

use crate::{
    config::RetryConfig,
    error::{GuardError, Result},
};

/// Exponential backoff parameters.
///
/// The delay before retry `n` (zero-based) is
/// `initial_delay * backoff_multiplier^n`, capped at `max_delay`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use billing_guard::reliability::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts, 3);
///
/// let patient = RetryPolicy {
///     max_attempts: 6,
///     initial_delay: Duration::from_millis(250),
///     max_delay: Duration::from_secs(30),
///     backoff_multiplier: 3.0,
/// };
/// # let _ = patient;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first (default: 3).
    pub max_attempts: u32,
    /// Delay before the first retry (default: 100ms).
    pub initial_delay: Duration,
    /// Delay cap (default: 5s).
    pub max_delay: Duration,
    /// Growth factor between retries (default: 2.0).
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
        }
    }
}

impl RetryPolicy {
    /// Default policy with a custom attempt count.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self { max_attempts, ..Self::default() }
    }

    /// Policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::with_max_attempts(1)
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss, reason = "acceptable for duration calculations")]
        let (initial_ms, cap_ms) =
            (self.initial_delay.as_millis() as f64, self.max_delay.as_millis() as f64);
        // f64::min also absorbs overflow to infinity.
        let delay_ms = (initial_ms * self.backoff_multiplier.powi(exponent)).min(cap_ms);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "delay_ms is clamped to [0, max_delay]"
        )]
        let delay = Duration::from_millis(delay_ms.max(0.0) as u64);
        delay.min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is exhausted.
///
/// A policy with `max_attempts == 0` still makes one attempt.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-retryable error immediately.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// use billing_guard::{
///     GuardError,
///     reliability::{RetryPolicy, retry_with_backoff},
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> billing_guard::Result<()> {
/// let calls = &AtomicU32::new(0);
/// let value = retry_with_backoff(&RetryPolicy::default(), || async move {
///     if calls.fetch_add(1, Ordering::Relaxed) == 0 {
///         Err(GuardError::SourceUnavailable("connection reset".to_owned()))
///     } else {
///         Ok(7)
///     }
/// })
/// .await?;
///
/// assert_eq!(value, 7);
/// assert_eq!(calls.load(Ordering::Relaxed), 2);
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_backoff<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempt = attempt + 1, "Fetch succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if !is_retryable(&error) => return Err(error),
            Err(error) if attempt + 1 >= max_attempts => {
                tracing::warn!(attempts = max_attempts, error = %error, "Retries exhausted");
                return Err(error);
            }
            Err(error) => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "Fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Returns `true` for errors that may clear up on their own.
///
/// Only [`GuardError::SourceUnavailable`] qualifies. Malformed data and
/// configuration problems fail the same way on every attempt.
#[must_use]
pub const fn is_retryable(error: &GuardError) -> bool {
    match error {
        GuardError::SourceUnavailable(_) => true,
        GuardError::InvalidTimestamp(_)
        | GuardError::InvalidOrganizationId(_)
        | GuardError::ConfigError(_)
        | GuardError::Serialization(_)
        | GuardError::TomlError(_)
        | GuardError::MonitorClosed => false,
    }
}

//! Grace-period computation.
//!
//! # Algorithm
//!
//! ```text
//! failed_count < threshold or no last attempt
//!     -> not in grace, no end date, no remaining days
//! otherwise
//!     ends_at   = last_attempt + duration_days
//!     in_grace  = now < ends_at
//!     remaining = in_grace ? ceil((ends_at - now) / 1 day) : 0
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{GuardError, Result},
    subscription::state::parse_timestamp,
};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Failed attempts after which the grace window opens.
pub const DEFAULT_GRACE_THRESHOLD: u32 = 3;

/// Length of the grace window in days.
pub const DEFAULT_GRACE_DURATION_DAYS: u32 = 7;

/// Failed-payment row as returned by the hosted store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedPaymentRecord {
    /// Consecutive failed payment attempts.
    #[serde(default)]
    pub failed_count: u32,
    /// Timestamp of the most recent attempt.
    #[serde(default)]
    pub last_payment_attempt: Option<String>,
}

impl FailedPaymentRecord {
    /// Parses the record into a [`FailedPaymentState`].
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InvalidTimestamp`] if `last_payment_attempt` cannot be parsed.
    pub fn into_state(self) -> Result<FailedPaymentState> {
        let last_payment_attempt = self
            .last_payment_attempt
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_timestamp("lastPaymentAttempt", s))
            .transpose()?;

        Ok(FailedPaymentState { failed_count: self.failed_count, last_payment_attempt })
    }
}

/// Parsed failed-payment scalars of one organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedPaymentState {
    /// Consecutive failed payment attempts.
    #[serde(default)]
    pub failed_count: u32,
    /// When the most recent attempt happened.
    #[serde(default)]
    pub last_payment_attempt: Option<DateTime<Utc>>,
}

impl FailedPaymentState {
    /// The "no failed payment" state, also used when the store cannot be read.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

/// Derived grace-period fields, exposed for billing banners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraceStatus {
    /// Whether the organization is inside the grace window right now.
    pub is_in_grace_period: bool,
    /// When the grace window closes (or closed).
    pub grace_period_ends_at: Option<DateTime<Utc>>,
    /// Whole days left, rounded up. `Some(0)` once the window has closed.
    pub days_remaining_in_grace: Option<u32>,
}

/// Grace-period parameters.
///
/// # Examples
///
/// ```
/// use billing_guard::payments::{FailedPaymentState, GracePolicy};
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let state = FailedPaymentState {
///     failed_count: 3,
///     last_payment_attempt: Some(now - Duration::days(2)),
/// };
///
/// let status = GracePolicy::default().grace_status(&state, now);
/// assert!(status.is_in_grace_period);
/// assert_eq!(status.days_remaining_in_grace, Some(5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GracePolicy {
    /// Failed attempts at which the grace window opens (default: 3).
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    /// Length of the grace window in days (default: 7).
    #[serde(default = "default_duration_days")]
    pub duration_days: u32,
}

fn default_threshold() -> u32 {
    DEFAULT_GRACE_THRESHOLD
}

fn default_duration_days() -> u32 {
    DEFAULT_GRACE_DURATION_DAYS
}

impl Default for GracePolicy {
    fn default() -> Self {
        Self { threshold: DEFAULT_GRACE_THRESHOLD, duration_days: DEFAULT_GRACE_DURATION_DAYS }
    }
}

impl GracePolicy {
    /// Validates grace parameters.
    ///
    /// # Errors
    ///
    /// Returns error if `threshold` is 0 or `duration_days` is outside 1-365.
    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 {
            return Err(GuardError::ConfigError("grace threshold must be at least 1".into()));
        }
        if self.duration_days == 0 || self.duration_days > 365 {
            return Err(GuardError::ConfigError(
                "grace duration_days must be between 1 and 365".into(),
            ));
        }
        Ok(())
    }

    /// Returns `true` if the failure count has reached the threshold.
    #[must_use]
    pub fn threshold_reached(&self, state: &FailedPaymentState) -> bool {
        state.failed_count >= self.threshold
    }

    /// Computes the grace window for `state` as of `now`.
    #[must_use]
    pub fn grace_status(&self, state: &FailedPaymentState, now: DateTime<Utc>) -> GraceStatus {
        let Some(last_attempt) = state.last_payment_attempt else {
            return GraceStatus::default();
        };
        if !self.threshold_reached(state) {
            return GraceStatus::default();
        }

        let ends_at = last_attempt + Duration::days(i64::from(self.duration_days));
        let is_in_grace_period = now < ends_at;
        let days_remaining = if is_in_grace_period { ceil_days(ends_at - now) } else { 0 };

        GraceStatus {
            is_in_grace_period,
            grace_period_ends_at: Some(ends_at),
            days_remaining_in_grace: Some(days_remaining),
        }
    }

    /// Returns `true` once repeated failures should suspend access.
    ///
    /// That is the case when the threshold is reached and the organization is
    /// not (or no longer) inside the grace window. Without a recorded last
    /// attempt there is no window to wait for.
    #[must_use]
    pub fn grace_exhausted(&self, state: &FailedPaymentState, now: DateTime<Utc>) -> bool {
        self.threshold_reached(state) && !self.grace_status(state, now).is_in_grace_period
    }
}

/// Rounds a positive duration up to whole days.
fn ceil_days(remaining: Duration) -> u32 {
    let millis = remaining.num_milliseconds().max(0);
    let days = (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY;
    u32::try_from(days).unwrap_or(u32::MAX)
}

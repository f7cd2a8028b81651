//! Access decision rules.
//!
//! Rules are evaluated in priority order and the first match wins. The
//! checks overlap, so the order is part of the contract:
//!
//! ```text
//!  1. loading or subscribed/is_trial_active unknown  -> allow, loading
//!  2. is_trial_active                                -> allow
//!  3. subscribed and payments suspended (policy)     -> deny grace_period_expired
//!  4. subscribed                                     -> allow
//!  5. trial_end_date in the past                     -> deny trial_expired
//!  6. is_cancelled                                   -> deny subscription_cancelled
//!  7. no trial_end_date (never started a trial)      -> allow
//!  8. otherwise                                      -> deny no_subscription
//! ```
//!
//! Rule 3 depends on [`SuspensionPolicy`]. Under
//! [`SuspensionPolicy::ShortCircuit`] it never fires, which reproduces the
//! legacy behavior where an active subscription returned before the
//! failed-payment check was reached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::verdict::{AccessAssessment, AccessVerdict, DenialReason};
use crate::{
    payments::{FailedPaymentState, GracePolicy},
    subscription::SubscriptionSnapshot,
};

/// How failed payments affect organizations with an active subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspensionPolicy {
    /// Active subscriptions are never suspended for failed payments.
    ShortCircuit,
    /// Suspend as soon as the failure threshold is reached. The grace window
    /// is informational only.
    Immediate,
    /// Suspend once the failure threshold is reached and the grace window
    /// has closed.
    #[default]
    AfterGrace,
}

/// Pure access decision engine.
///
/// Holds only configuration; every call to [`evaluate`](Self::evaluate) is a
/// function of its arguments, so identical inputs and the same `now` always
/// yield identical verdicts.
///
/// # Examples
///
/// ```
/// use billing_guard::{
///     guard::{AccessGuard, DenialReason},
///     payments::FailedPaymentState,
///     subscription::{SubscriptionSnapshot, SubscriptionState},
/// };
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let snapshot = SubscriptionSnapshot::resolved(SubscriptionState {
///     subscribed: Some(false),
///     is_trial_active: Some(false),
///     is_cancelled: false,
///     trial_end_date: Some(now - Duration::days(1)),
/// });
///
/// let verdict = AccessGuard::default().evaluate(&snapshot, &FailedPaymentState::none(), now);
/// assert!(!verdict.has_access);
/// assert_eq!(verdict.reason, Some(DenialReason::TrialExpired));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessGuard {
    grace: GracePolicy,
    suspension: SuspensionPolicy,
}

impl AccessGuard {
    /// Creates a guard with explicit grace and suspension policies.
    #[must_use]
    pub const fn new(grace: GracePolicy, suspension: SuspensionPolicy) -> Self {
        Self { grace, suspension }
    }

    /// Returns the grace policy.
    #[must_use]
    pub const fn grace_policy(&self) -> &GracePolicy {
        &self.grace
    }

    /// Returns the suspension policy.
    #[must_use]
    pub const fn suspension_policy(&self) -> SuspensionPolicy {
        self.suspension
    }

    /// Decides whether the organization may use the product.
    #[must_use]
    pub fn evaluate(
        &self,
        subscription: &SubscriptionSnapshot,
        payments: &FailedPaymentState,
        now: DateTime<Utc>,
    ) -> AccessVerdict {
        let state = &subscription.state;

        // Never deny on partial data.
        if subscription.loading {
            return AccessVerdict::loading();
        }
        let (Some(subscribed), Some(is_trial_active)) = (state.subscribed, state.is_trial_active)
        else {
            return AccessVerdict::loading();
        };

        if is_trial_active {
            return AccessVerdict::granted();
        }

        if subscribed {
            if self.payments_suspended(payments, now) {
                return AccessVerdict::denied(DenialReason::GracePeriodExpired);
            }
            return AccessVerdict::granted();
        }

        // From here on: not subscribed, no active trial.
        if state.trial_end_date.is_some_and(|end| end < now) {
            return AccessVerdict::denied(DenialReason::TrialExpired);
        }

        if state.is_cancelled {
            return AccessVerdict::denied(DenialReason::SubscriptionCancelled);
        }

        // Users who never started a trial still need to reach the billing
        // and trial-start screens.
        if state.trial_end_date.is_none() {
            return AccessVerdict::granted();
        }

        AccessVerdict::denied(DenialReason::NoSubscription)
    }

    /// Evaluates and attaches the grace-period details.
    #[must_use]
    pub fn assess(
        &self,
        subscription: &SubscriptionSnapshot,
        payments: &FailedPaymentState,
        now: DateTime<Utc>,
    ) -> AccessAssessment {
        AccessAssessment {
            verdict: self.evaluate(subscription, payments, now),
            grace: self.grace.grace_status(payments, now),
            failed_count: payments.failed_count,
        }
    }

    fn payments_suspended(&self, payments: &FailedPaymentState, now: DateTime<Utc>) -> bool {
        match self.suspension {
            SuspensionPolicy::ShortCircuit => false,
            SuspensionPolicy::Immediate => self.grace.threshold_reached(payments),
            SuspensionPolicy::AfterGrace => self.grace.grace_exhausted(payments, now),
        }
    }
}

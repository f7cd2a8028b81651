//! Access verdicts and denial reasons.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::payments::GraceStatus;

/// Why access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The free trial ended without a paid subscription.
    TrialExpired,
    /// The subscription was cancelled.
    SubscriptionCancelled,
    /// No payment method on file.
    ///
    /// Not produced by the built-in rules; available to callers composing
    /// their own verdicts.
    NoPaymentMethod,
    /// A trial existed but no subscription was ever started.
    NoSubscription,
    /// Repeated payment failures suspended the account.
    GracePeriodExpired,
}

impl DenialReason {
    /// Returns the wire name (`trial_expired`, ...).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TrialExpired => "trial_expired",
            Self::SubscriptionCancelled => "subscription_cancelled",
            Self::NoPaymentMethod => "no_payment_method",
            Self::NoSubscription => "no_subscription",
            Self::GracePeriodExpired => "grace_period_expired",
        }
    }

    /// Short heading for notifications.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::TrialExpired => "Trial expired",
            Self::SubscriptionCancelled => "Subscription cancelled",
            Self::NoPaymentMethod => "Payment method required",
            Self::NoSubscription => "Subscription required",
            Self::GracePeriodExpired => "Account suspended",
        }
    }

    /// User-facing explanation with the suggested remediation.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::TrialExpired => {
                "Your free trial has ended. Subscribe to keep managing your properties."
            }
            Self::SubscriptionCancelled => {
                "Your subscription has been cancelled. Reactivate it to restore access."
            }
            Self::NoPaymentMethod => "No payment method is on file. Add one to continue.",
            Self::NoSubscription => {
                "You don't have an active subscription. Choose a plan to continue."
            }
            Self::GracePeriodExpired => {
                "Access is suspended after repeated failed payments. Update your payment method \
                 to restore access."
            }
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The guard's decision for the current evaluation.
///
/// Recomputed on every input change and never persisted.
///
/// # Examples
///
/// ```
/// use billing_guard::guard::{AccessVerdict, DenialReason};
///
/// let verdict = AccessVerdict::denied(DenialReason::TrialExpired);
/// assert!(!verdict.has_access);
/// assert_eq!(verdict.reason, Some(DenialReason::TrialExpired));
///
/// let json = serde_json::to_string(&verdict)?;
/// assert!(json.contains("\"reason\":\"trial_expired\""));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessVerdict {
    /// Whether the organization may use the product.
    pub has_access: bool,
    /// Whether inputs are still loading.
    pub is_loading: bool,
    /// Denial reason, present only when access is denied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    /// User-facing message for the denial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AccessVerdict {
    /// Inputs are incomplete: allow access and keep loading.
    #[must_use]
    pub fn loading() -> Self {
        Self { has_access: true, is_loading: true, reason: None, message: None }
    }

    /// Access granted.
    #[must_use]
    pub fn granted() -> Self {
        Self { has_access: true, is_loading: false, reason: None, message: None }
    }

    /// Access denied for `reason`.
    #[must_use]
    pub fn denied(reason: DenialReason) -> Self {
        Self {
            has_access: false,
            is_loading: false,
            reason: Some(reason),
            message: Some(reason.message().to_owned()),
        }
    }

    /// Returns `true` if this verdict blocks the organization.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        !self.has_access
    }
}

impl Default for AccessVerdict {
    fn default() -> Self {
        Self::loading()
    }
}

/// Verdict plus grace-period details for banner-style consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessAssessment {
    /// The access decision.
    pub verdict: AccessVerdict,
    /// Failed-payment grace window, informational.
    pub grace: GraceStatus,
    /// Consecutive failed payments the decision was based on.
    pub failed_count: u32,
}

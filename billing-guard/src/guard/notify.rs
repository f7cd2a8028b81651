//! User-facing notifications for blocked verdicts.
//!
//! When an organization moves into a blocked state the guard emits one
//! [`Notification`] carrying the denial message and an action that routes
//! the user to the billing page. Delivery is left to a [`Notifier`]; the UI
//! layer typically drains a [`ChannelNotifier`].

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::verdict::{AccessVerdict, DenialReason};
use crate::subscription::OrganizationId;

/// Default in-app path of the billing page.
pub const DEFAULT_BILLING_PATH: &str = "/billing";

/// Default label of the notification action button.
pub const DEFAULT_ACTION_LABEL: &str = "Manage billing";

/// Notification request for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Short heading.
    pub title: String,
    /// Denial message.
    pub description: String,
    /// Label of the action button.
    pub action_label: String,
    /// In-app path the action navigates to.
    pub action_target: String,
}

impl Notification {
    /// Builds the notification for a denial.
    #[must_use]
    pub fn for_denial(reason: DenialReason, policy: &NotificationPolicy) -> Self {
        Self {
            title: reason.title().to_owned(),
            description: reason.message().to_owned(),
            action_label: policy.action_label.clone(),
            action_target: policy.billing_path.clone(),
        }
    }
}

/// Controls when and how notifications are produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPolicy {
    /// Suppress repeats of the same blocked verdict (default: true).
    #[serde(default = "default_dedupe")]
    pub dedupe: bool,
    /// In-app path of the billing page (default: `/billing`).
    #[serde(default = "default_billing_path")]
    pub billing_path: String,
    /// Label of the action button (default: `Manage billing`).
    #[serde(default = "default_action_label")]
    pub action_label: String,
}

fn default_dedupe() -> bool {
    true
}

fn default_billing_path() -> String {
    DEFAULT_BILLING_PATH.to_owned()
}

fn default_action_label() -> String {
    DEFAULT_ACTION_LABEL.to_owned()
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            dedupe: default_dedupe(),
            billing_path: default_billing_path(),
            action_label: default_action_label(),
        }
    }
}

/// Decides which verdicts produce a notification.
///
/// Only blocked verdicts notify. With `dedupe` enabled a blocked verdict
/// with the same reason as the previous one stays silent. Only a settled
/// verdict that grants access re-arms the gate; a loading verdict (for
/// example after a transient read failure) leaves it as it was.
///
/// # Examples
///
/// ```
/// use billing_guard::guard::{AccessVerdict, DenialReason, NotificationGate, NotificationPolicy};
///
/// let mut gate = NotificationGate::new(NotificationPolicy::default());
/// let blocked = AccessVerdict::denied(DenialReason::TrialExpired);
///
/// assert!(gate.observe(&blocked).is_some());
/// assert!(gate.observe(&blocked).is_none());
///
/// gate.observe(&AccessVerdict::granted());
/// assert!(gate.observe(&blocked).is_some());
/// ```
#[derive(Debug, Clone)]
pub struct NotificationGate {
    policy: NotificationPolicy,
    last_reason: Option<DenialReason>,
}

impl NotificationGate {
    /// Creates a gate with no previous verdict.
    #[must_use]
    pub fn new(policy: NotificationPolicy) -> Self {
        Self { policy, last_reason: None }
    }

    /// Returns the policy in use.
    #[must_use]
    pub fn policy(&self) -> &NotificationPolicy {
        &self.policy
    }

    /// Records `verdict` and returns the notification to show, if any.
    pub fn observe(&mut self, verdict: &AccessVerdict) -> Option<Notification> {
        if verdict.has_access {
            if !verdict.is_loading {
                self.last_reason = None;
            }
            return None;
        }
        let reason = verdict.reason?;

        let repeated = self.last_reason == Some(reason);
        self.last_reason = Some(reason);
        if repeated && self.policy.dedupe {
            return None;
        }
        Some(Notification::for_denial(reason, &self.policy))
    }
}

/// Delivers notifications.
pub trait Notifier: Send + Sync {
    /// Delivers `notification` for `organization`.
    fn notify(&self, organization: &OrganizationId, notification: Notification);
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, organization: &OrganizationId, notification: Notification) {
        info!(
            organization = %organization,
            title = %notification.title,
            action_target = %notification.action_target,
            "Access notification"
        );
    }
}

/// Notifier that forwards notifications over an unbounded channel.
///
/// # Examples
///
/// ```
/// use billing_guard::{
///     guard::{ChannelNotifier, DenialReason, Notification, NotificationPolicy, Notifier},
///     subscription::OrganizationId,
/// };
///
/// let (notifier, mut rx) = ChannelNotifier::channel();
/// let org = OrganizationId::new("org-1").unwrap();
/// notifier.notify(
///     &org,
///     Notification::for_denial(DenialReason::NoSubscription, &NotificationPolicy::default()),
/// );
///
/// let (to, received) = rx.try_recv().unwrap();
/// assert_eq!(to, org);
/// assert_eq!(received.action_target, "/billing");
/// ```
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<(OrganizationId, Notification)>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiving end.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<(OrganizationId, Notification)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, organization: &OrganizationId, notification: Notification) {
        if self.tx.send((organization.clone(), notification)).is_err() {
            warn!(organization = %organization, "Notification receiver dropped");
        }
    }
}

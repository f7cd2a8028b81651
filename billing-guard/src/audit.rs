//! Audit logging for access-verdict changes.
//!
//! Every time a monitored organization's verdict changes an
//! [`AccessAuditEvent`] is written to the `audit` tracing target, so support
//! can reconstruct when and why an organization was locked out or let back in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    guard::{AccessVerdict, DenialReason},
    subscription::OrganizationId,
};

/// Kind of verdict change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTransition {
    /// First settled verdict after the monitor started.
    Initial,
    /// Access was granted by a settled verdict after being blocked.
    Restored,
    /// Access was blocked after being granted.
    Blocked,
    /// Still blocked, but for a different reason.
    ReasonChanged,
    /// Loading state entered or left, including a blocked organization
    /// whose data became unreadable.
    LoadingChanged,
}

/// Audit record of one verdict change.
///
/// # Examples
///
/// ```
/// use billing_guard::{
///     audit::{AccessAuditEvent, AccessTransition, audit_log},
///     guard::{AccessVerdict, DenialReason},
///     subscription::OrganizationId,
/// };
///
/// let org = OrganizationId::new("org-7").unwrap();
/// let event = AccessAuditEvent::new(
///     &org,
///     Some(&AccessVerdict::granted()),
///     &AccessVerdict::denied(DenialReason::TrialExpired),
/// );
///
/// assert_eq!(event.transition, AccessTransition::Blocked);
/// audit_log(&event);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessAuditEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the change was observed.
    pub timestamp: DateTime<Utc>,
    /// Organization whose verdict changed.
    pub organization_id: OrganizationId,
    /// Kind of change.
    pub transition: AccessTransition,
    /// Previous `has_access`, if there was a previous verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_has_access: Option<bool>,
    /// New `has_access`.
    pub has_access: bool,
    /// New `is_loading`.
    pub is_loading: bool,
    /// New denial reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
}

impl AccessAuditEvent {
    /// Creates an event describing the move from `previous` to `current`.
    #[must_use]
    pub fn new(
        organization: &OrganizationId,
        previous: Option<&AccessVerdict>,
        current: &AccessVerdict,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            organization_id: organization.clone(),
            transition: classify(previous, current),
            previous_has_access: previous.map(|v| v.has_access),
            has_access: current.has_access,
            is_loading: current.is_loading,
            reason: current.reason,
        }
    }
}

fn classify(previous: Option<&AccessVerdict>, current: &AccessVerdict) -> AccessTransition {
    let Some(previous) = previous else {
        return AccessTransition::Initial;
    };
    if current.is_loading {
        return AccessTransition::LoadingChanged;
    }
    match (previous.has_access, current.has_access) {
        (true, false) => AccessTransition::Blocked,
        (false, true) => AccessTransition::Restored,
        (false, false) => AccessTransition::ReasonChanged,
        (true, true) => AccessTransition::LoadingChanged,
    }
}

/// Logs an audit event to tracing with target "audit".
pub fn audit_log(event: &AccessAuditEvent) {
    tracing::info!(
        target: "audit",
        event_id = %event.event_id,
        timestamp = %event.timestamp.to_rfc3339(),
        organization_id = %event.organization_id,
        transition = ?event.transition,
        previous_has_access = ?event.previous_has_access,
        has_access = event.has_access,
        is_loading = event.is_loading,
        reason = ?event.reason,
        "AUDIT"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> OrganizationId {
        OrganizationId::new("org-audit").unwrap()
    }

    #[test]
    fn test_initial_event() {
        let event = AccessAuditEvent::new(&org(), None, &AccessVerdict::granted());
        assert_eq!(event.transition, AccessTransition::Initial);
        assert!(event.previous_has_access.is_none());
    }

    #[test]
    fn test_blocked_and_restored() {
        let granted = AccessVerdict::granted();
        let denied = AccessVerdict::denied(DenialReason::SubscriptionCancelled);

        let blocked = AccessAuditEvent::new(&org(), Some(&granted), &denied);
        assert_eq!(blocked.transition, AccessTransition::Blocked);
        assert_eq!(blocked.reason, Some(DenialReason::SubscriptionCancelled));

        let restored = AccessAuditEvent::new(&org(), Some(&denied), &granted);
        assert_eq!(restored.transition, AccessTransition::Restored);
        assert_eq!(restored.previous_has_access, Some(false));
    }

    #[test]
    fn test_reason_changed() {
        let event = AccessAuditEvent::new(
            &org(),
            Some(&AccessVerdict::denied(DenialReason::NoSubscription)),
            &AccessVerdict::denied(DenialReason::TrialExpired),
        );
        assert_eq!(event.transition, AccessTransition::ReasonChanged);
    }

    #[test]
    fn test_loading_changed() {
        let event =
            AccessAuditEvent::new(&org(), Some(&AccessVerdict::loading()), &AccessVerdict::granted());
        assert_eq!(event.transition, AccessTransition::LoadingChanged);
    }

    #[test]
    fn test_blocked_to_loading_is_not_restored() {
        let event = AccessAuditEvent::new(
            &org(),
            Some(&AccessVerdict::denied(DenialReason::TrialExpired)),
            &AccessVerdict::loading(),
        );
        assert_eq!(event.transition, AccessTransition::LoadingChanged);
        assert_eq!(event.previous_has_access, Some(false));
        assert!(event.has_access);
    }

    #[test]
    fn test_loading_to_blocked() {
        let event = AccessAuditEvent::new(
            &org(),
            Some(&AccessVerdict::loading()),
            &AccessVerdict::denied(DenialReason::NoSubscription),
        );
        assert_eq!(event.transition, AccessTransition::Blocked);
    }

    #[test]
    fn test_event_serialization() {
        let event = AccessAuditEvent::new(
            &org(),
            Some(&AccessVerdict::granted()),
            &AccessVerdict::denied(DenialReason::GracePeriodExpired),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"transition\":\"blocked\""));
        assert!(json.contains("\"reason\":\"grace_period_expired\""));
        assert!(json.contains("\"organization_id\":\"org-audit\""));
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = AccessAuditEvent::new(&org(), None, &AccessVerdict::granted());
        let b = AccessAuditEvent::new(&org(), None, &AccessVerdict::granted());
        assert_ne!(a.event_id, b.event_id);
    }
}

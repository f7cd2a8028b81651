//! Input and output documents of the operator binary.

use billing_guard::{
    GuardConfig, Result,
    guard::{AccessAssessment, Notification, NotificationGate},
    payments::{FailedPaymentRecord, StaticFailedPaymentSource, resolve_failed_payments},
    subscription::{OrganizationId, StaticSubscriptionSource, SubscriptionRecord, resolve_subscription},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Billing data of one organization as exported from the store.
///
/// ```json
/// {
///   "organizationId": "org-42",
///   "now": "2025-06-01T12:00:00Z",
///   "subscription": { "subscribed": false, "isTrialActive": false, "trialEndDate": "2025-05-01T00:00:00Z" },
///   "failedPayments": { "failedCount": 0 }
/// }
/// ```
///
/// A missing `subscription` is evaluated as an unreadable store, a missing
/// `failedPayments` as "no failures", and a missing `now` as the wall clock.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInput {
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subscription: Option<SubscriptionRecord>,
    #[serde(default)]
    pub failed_payments: Option<FailedPaymentRecord>,
}

impl SnapshotInput {
    /// Parses a snapshot document.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Serialization`](billing_guard::GuardError::Serialization)
    /// for malformed JSON or an invalid organization ID.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Evaluation result printed to stdout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub organization_id: OrganizationId,
    pub evaluated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub assessment: AccessAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
}

impl EvaluationReport {
    /// Renders the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Serialization`](billing_guard::GuardError::Serialization)
    /// if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs one evaluation of `input` under `config`.
///
/// The records go through the same resolution path as a live monitor, so
/// malformed timestamps fail open exactly as they would in production.
#[instrument(skip_all, fields(organization = %input.organization_id))]
pub async fn evaluate(input: SnapshotInput, config: &GuardConfig) -> EvaluationReport {
    let subscriptions = match input.subscription {
        Some(record) => StaticSubscriptionSource::new(record),
        None => StaticSubscriptionSource::failing("snapshot has no subscription record"),
    };
    let payments = input
        .failed_payments
        .map_or_else(StaticFailedPaymentSource::clean, StaticFailedPaymentSource::new);

    let snapshot = resolve_subscription(&subscriptions, &input.organization_id).await;
    let failures = resolve_failed_payments(&payments, &input.organization_id).await;

    let now = input.now.unwrap_or_else(Utc::now);
    let assessment = config.guard().assess(&snapshot, &failures, now);
    let notification = NotificationGate::new(config.notification_policy()).observe(&assessment.verdict);

    info!(
        has_access = assessment.verdict.has_access,
        reason = ?assessment.verdict.reason,
        "Snapshot evaluated"
    );

    EvaluationReport {
        organization_id: input.organization_id,
        evaluated_at: now,
        assessment,
        notification,
    }
}

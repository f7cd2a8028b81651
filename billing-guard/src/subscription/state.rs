//! Subscription records, parsed state, and snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GuardError, Result};

/// Postgres `timestamptz` text output, e.g. `2025-03-01 12:00:00.123+00`.
const POSTGRES_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%#z";

/// Identifier of a tenant organization.
///
/// Wraps the store's organization key with validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrganizationId(String);

impl OrganizationId {
    /// Creates a new organization ID after validation.
    ///
    /// # Errors
    ///
    /// Returns error if ID is empty, exceeds 64 characters, or contains invalid characters.
    /// Only alphanumeric characters, hyphens, and underscores are allowed.
    ///
    /// # Examples
    ///
    /// ```
    /// use billing_guard::subscription::OrganizationId;
    ///
    /// assert!(OrganizationId::new("org-42").is_ok());
    /// assert!(OrganizationId::new("org 42").is_err());
    /// ```
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(GuardError::InvalidOrganizationId(
                "organization_id cannot be empty".into(),
            ));
        }
        if id.len() > 64 {
            return Err(GuardError::InvalidOrganizationId(
                "organization_id must be 64 characters or less".into(),
            ));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(GuardError::InvalidOrganizationId(format!(
                "organization_id can only contain alphanumeric characters, hyphens, and \
                 underscores: {id}"
            )));
        }
        Ok(Self(id))
    }

    /// Returns the inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OrganizationId {
    type Error = GuardError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<OrganizationId> for String {
    fn from(id: OrganizationId) -> Self {
        id.0
    }
}

/// Parses a stored timestamp.
///
/// Accepts RFC 3339 as well as the Postgres text form the hosted store emits
/// for `timestamptz` columns.
pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, POSTGRES_TIMESTAMP_FORMAT))
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| GuardError::InvalidTimestamp(format!("{field}: '{value}' ({e})")))
}

/// Billing row as returned by the hosted store.
///
/// Field names follow the store's camelCase JSON. Missing keys deserialize
/// as unresolved (`None`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    /// Whether a paid subscription is active.
    #[serde(default)]
    pub subscribed: Option<bool>,
    /// Whether a free trial is currently running.
    #[serde(default)]
    pub is_trial_active: Option<bool>,
    /// Whether the subscription was cancelled.
    #[serde(default)]
    pub is_cancelled: bool,
    /// Trial end as an RFC 3339 (or Postgres) timestamp.
    #[serde(default)]
    pub trial_end_date: Option<String>,
}

impl SubscriptionRecord {
    /// Parses the record into a [`SubscriptionState`].
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InvalidTimestamp`] if `trial_end_date` cannot be parsed.
    ///
    /// # Examples
    ///
    /// ```
    /// use billing_guard::subscription::SubscriptionRecord;
    ///
    /// let record: SubscriptionRecord = serde_json::from_str(
    ///     r#"{"subscribed":false,"isTrialActive":true,"trialEndDate":"2030-01-01T00:00:00Z"}"#,
    /// )?;
    /// let state = record.into_state()?;
    /// assert_eq!(state.is_trial_active, Some(true));
    /// assert!(state.trial_end_date.is_some());
    /// # Ok::<(), billing_guard::GuardError>(())
    /// ```
    pub fn into_state(self) -> Result<SubscriptionState> {
        let trial_end_date = self
            .trial_end_date
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_timestamp("trialEndDate", s))
            .transpose()?;

        Ok(SubscriptionState {
            subscribed: self.subscribed,
            is_trial_active: self.is_trial_active,
            is_cancelled: self.is_cancelled,
            trial_end_date,
        })
    }
}

/// Parsed subscription state of one organization.
///
/// `None` means "not yet loaded". The state is only replaced by a refetch,
/// never mutated locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionState {
    /// Whether a paid subscription is active.
    pub subscribed: Option<bool>,
    /// Whether a free trial is currently running.
    pub is_trial_active: Option<bool>,
    /// Whether the subscription was cancelled.
    #[serde(default)]
    pub is_cancelled: bool,
    /// When the trial ends (or ended).
    pub trial_end_date: Option<DateTime<Utc>>,
}

impl SubscriptionState {
    /// Returns `true` once both nullable flags are known.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.subscribed.is_some() && self.is_trial_active.is_some()
    }
}

/// Subscription state together with the source's loading flag.
///
/// This is what the guard consumes: the source may still report `loading`
/// even after individual fields arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSnapshot {
    /// Parsed subscription fields.
    #[serde(flatten)]
    pub state: SubscriptionState,
    /// Whether the source is still fetching.
    #[serde(default)]
    pub loading: bool,
}

impl SubscriptionSnapshot {
    /// Snapshot for a source that has not resolved anything yet.
    #[must_use]
    pub fn loading() -> Self {
        Self { state: SubscriptionState::default(), loading: true }
    }

    /// Snapshot for a completed fetch.
    #[must_use]
    pub fn resolved(state: SubscriptionState) -> Self {
        Self { state, loading: false }
    }

    /// Returns `true` when no field is pending and the source is idle.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.loading && self.state.is_resolved()
    }
}

impl Default for SubscriptionSnapshot {
    fn default() -> Self {
        Self::loading()
    }
}

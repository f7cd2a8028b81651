//! Error types for billing-guard.
//!
//! This module defines every error that can surface while resolving
//! subscription data, loading configuration, or running an access monitor.
//! All errors implement [`std::error::Error`] via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Collaborator errors** ([`GuardError::SourceUnavailable`]): the hosted store could not be
//!   read. These never become a blocking verdict; resolution falls back to the loading state.
//! - **Data errors** ([`GuardError::InvalidTimestamp`], [`GuardError::InvalidOrganizationId`],
//!   [`GuardError::Serialization`]): a record was malformed.
//! - **Configuration errors** ([`GuardError::ConfigError`], [`GuardError::TomlError`]).
//! - **Lifecycle errors** ([`GuardError::MonitorClosed`]).
//!
//! # Examples
//!
//! ```
//! use billing_guard::error::{GuardError, Result};
//!
//! fn parse_interval(secs: u64) -> Result<u64> {
//!     if secs == 0 {
//!         return Err(GuardError::ConfigError("poll interval must be positive".to_owned()));
//!     }
//!     Ok(secs)
//! }
//! ```

use thiserror::Error;

/// Result type alias for billing-guard operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, GuardError>;

/// Errors that can occur in billing-guard.
///
/// # Error Recovery
///
/// - **Transient errors** ([`SourceUnavailable`](Self::SourceUnavailable)): retry inside the
///   collaborator (see [`crate::reliability`]); the guard itself stays fail-open
/// - **Data errors** ([`InvalidTimestamp`](Self::InvalidTimestamp)): fix the stored record
/// - **Configuration errors** ([`ConfigError`](Self::ConfigError)): fix the config file and reload
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum GuardError {
    /// A collaborator (subscription store, failed-payment store) could not be read.
    ///
    /// Common causes include network timeouts, database outages, and expired
    /// service credentials.
    ///
    /// # Recovery
    ///
    /// Retry with exponential backoff. While the error persists the guard reports
    /// a loading verdict with access allowed.
    #[error("billing data source unavailable: {0}")]
    SourceUnavailable(String),

    /// A stored timestamp is not valid RFC 3339.
    ///
    /// # Examples
    ///
    /// ```
    /// use billing_guard::error::GuardError;
    ///
    /// let err = GuardError::InvalidTimestamp("trialEndDate: not-a-date".to_owned());
    /// assert!(err.to_string().contains("Invalid timestamp"));
    /// ```
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// An organization identifier failed validation.
    ///
    /// Organization IDs must be 1-64 characters of letters, digits, hyphens,
    /// and underscores.
    #[error("Invalid organization ID: {0}")]
    InvalidOrganizationId(String),

    /// Guard configuration is invalid.
    #[error("Invalid guard configuration: {0}")]
    ConfigError(String),

    /// JSON encoding or decoding failed.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// The access monitor task has stopped and can no longer accept requests.
    #[error("access monitor has been shut down")]
    MonitorClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_unavailable_display() {
        let error = GuardError::SourceUnavailable("connection reset".into());
        assert_eq!(error.to_string(), "billing data source unavailable: connection reset");
    }

    #[test]
    fn test_invalid_organization_id_display() {
        let error = GuardError::InvalidOrganizationId("org@acme".to_owned());
        assert_eq!(error.to_string(), "Invalid organization ID: org@acme");
    }

    #[test]
    fn test_config_error_display() {
        let error = GuardError::ConfigError("threshold must be at least 1".to_owned());
        assert!(error.to_string().contains("Invalid guard configuration"));
    }

    #[test]
    fn test_serialization_error_from() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let error = GuardError::from(json_err);
        assert!(matches!(error, GuardError::Serialization(_)));
    }

    #[test]
    fn test_monitor_closed_display() {
        assert_eq!(GuardError::MonitorClosed.to_string(), "access monitor has been shut down");
    }
}

//! Guard configuration.
//!
//! All sections are optional; an empty file yields the production defaults.
//!
//! ```toml
//! [grace]
//! threshold = 3
//! duration_days = 7
//!
//! [monitor]
//! poll_interval_secs = 300
//! suspension_policy = "after_grace"
//!
//! [notifications]
//! dedupe = true
//! billing_path = "/billing"
//! action_label = "Manage billing"
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 100
//! max_delay_ms = 5000
//! backoff_multiplier = 2.0
//! ```

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    error::{GuardError, Result},
    guard::{AccessGuard, NotificationPolicy, SuspensionPolicy},
    payments::GracePolicy,
    reliability::RetryPolicy,
};

/// Upper bound for `poll_interval_secs` (one day).
const MAX_POLL_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Root configuration.
///
/// # Examples
///
/// ```
/// use billing_guard::{config::GuardConfig, guard::SuspensionPolicy};
///
/// let config = GuardConfig::from_toml(
///     r#"
///     [grace]
///     threshold = 2
///
///     [monitor]
///     suspension_policy = "immediate"
///     "#,
/// )?;
///
/// assert_eq!(config.grace.threshold, 2);
/// assert_eq!(config.grace.duration_days, 7);
/// assert_eq!(config.guard().suspension_policy(), SuspensionPolicy::Immediate);
/// # Ok::<(), billing_guard::GuardError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Failed-payment grace window.
    #[serde(default)]
    pub grace: GracePolicy,
    /// Background monitor settings.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Notification behavior.
    #[serde(default)]
    pub notifications: NotificationPolicy,
    /// Retry behavior for collaborator fetches.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// `[monitor]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between re-evaluations (default: 300).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// How failed payments affect active subscriptions.
    #[serde(default)]
    pub suspension_policy: SuspensionPolicy,
}

fn default_poll_interval_secs() -> u64 {
    300
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            suspension_policy: SuspensionPolicy::default(),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per fetch, including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds (default: 100).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Delay cap in milliseconds (default: 5000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff growth factor (default: 2.0).
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(GuardError::ConfigError("retry max_attempts must be at least 1".into()));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(GuardError::ConfigError(format!(
                "retry backoff_multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(GuardError::ConfigError(format!(
                "retry initial_delay_ms ({}) exceeds max_delay_ms ({})",
                self.initial_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

impl GuardConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::TomlError`] for malformed TOML and
    /// [`GuardError::ConfigError`] for out-of-range values.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::ConfigError`] if the file cannot be read, plus
    /// everything [`from_toml`](Self::from_toml) returns.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GuardError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::ConfigError`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.grace.validate()?;

        if self.monitor.poll_interval_secs == 0
            || self.monitor.poll_interval_secs > MAX_POLL_INTERVAL_SECS
        {
            return Err(GuardError::ConfigError(format!(
                "monitor poll_interval_secs must be between 1 and {MAX_POLL_INTERVAL_SECS}"
            )));
        }

        validate_billing_path(&self.notifications.billing_path)?;
        if self.notifications.action_label.trim().is_empty() {
            return Err(GuardError::ConfigError(
                "notifications action_label cannot be empty".into(),
            ));
        }

        self.retry.validate()
    }

    /// Builds the decision engine.
    #[must_use]
    pub const fn guard(&self) -> AccessGuard {
        AccessGuard::new(self.grace, self.monitor.suspension_policy)
    }

    /// Returns the notification policy.
    #[must_use]
    pub fn notification_policy(&self) -> NotificationPolicy {
        self.notifications.clone()
    }

    /// Returns the monitor poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.poll_interval_secs)
    }

    /// Returns the retry policy for collaborator fetches.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }
}

/// The billing path is an in-app route: absolute, no traversal, no scheme.
fn validate_billing_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(GuardError::ConfigError(format!(
            "notifications billing_path must start with '/': {path}"
        )));
    }
    if path.contains("..") {
        return Err(GuardError::ConfigError(format!(
            "notifications billing_path contains path traversal: {path}"
        )));
    }
    if path.starts_with("//") || path.contains("://") {
        return Err(GuardError::ConfigError(format!(
            "notifications billing_path must be an in-app path, not a URL: {path}"
        )));
    }
    Ok(())
}

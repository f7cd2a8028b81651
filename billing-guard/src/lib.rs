//! Billing Guard: subscription-based access control for multi-tenant SaaS
//!
//! Decides whether an organization may use the product, based on its
//! subscription state and its record of failed payments. The decision is a
//! pure function of those inputs plus "now"; everything around it (fetching,
//! polling, notifying, auditing) is plumbing that feeds or consumes it.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────┐   ┌────────────────────────┐
//! │  SubscriptionSource   │   │  FailedPaymentSource   │  hosted store
//! └──────────┬────────────┘   └───────────┬────────────┘
//!            │ resolve_subscription       │ resolve_failed_payments
//!            │ (fail open: loading)       │ (fail open: no failures)
//! ┌──────────▼────────────────────────────▼────────────┐
//! │                    AccessGuard                     │  pure decision
//! │   ordered rules + GracePolicy + SuspensionPolicy   │
//! └──────────┬─────────────────────────────────────────┘
//!            │ AccessVerdict
//! ┌──────────▼────────────┐   ┌────────────────────────┐
//! │     AccessMonitor     │──▶│ NotificationGate ──▶   │  UI toast
//! │  (poll / refresh /    │   │ Notifier               │
//! │   watch channel)      │   └────────────────────────┘
//! └──────────┬────────────┘
//!            │ audit target
//!            ▼
//!       AccessAuditEvent
//! ```
//!
//! # Quick Start
//!
//! Evaluate once:
//!
//! ```
//! use billing_guard::{
//!     guard::{AccessGuard, DenialReason},
//!     payments::FailedPaymentState,
//!     subscription::{SubscriptionRecord, SubscriptionSnapshot},
//! };
//! use chrono::Utc;
//!
//! let record = SubscriptionRecord {
//!     subscribed: Some(false),
//!     is_trial_active: Some(false),
//!     is_cancelled: false,
//!     trial_end_date: Some("2020-01-01T00:00:00Z".to_owned()),
//! };
//! let snapshot = SubscriptionSnapshot::resolved(record.into_state()?);
//!
//! let verdict = AccessGuard::default().evaluate(&snapshot, &FailedPaymentState::none(), Utc::now());
//!
//! assert!(!verdict.has_access);
//! assert_eq!(verdict.reason, Some(DenialReason::TrialExpired));
//! # Ok::<(), billing_guard::GuardError>(())
//! ```
//!
//! Keep a verdict current in the background with
//! [`AccessMonitor`](guard::AccessMonitor), configured from TOML through
//! [`GuardConfig`](config::GuardConfig).
//!
//! # Failure Policy
//!
//! The guard fails open. A collaborator that cannot be read yields a
//! loading verdict (`has_access = true`, `is_loading = true`) rather than a
//! denial; a failed-payment read error counts as "no failures". A denial is
//! only ever produced from fully resolved data.
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`](error::Result) with a
//! [`GuardError`]. Transient collaborator errors can be retried with
//! [`reliability::retry_with_backoff`] or the retrying source decorators.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod audit;
pub mod config;
pub mod error;
pub mod guard;
pub mod payments;
pub mod reliability;
pub mod subscription;

pub use config::GuardConfig;
pub use error::{GuardError, Result};
pub use guard::{AccessGuard, AccessMonitor, AccessVerdict, DenialReason, SuspensionPolicy};

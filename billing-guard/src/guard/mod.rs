//! The access guard.
//!
//! [`AccessGuard`] turns a subscription snapshot and failed-payment state into
//! an [`AccessVerdict`]. [`AccessMonitor`] keeps that verdict current for one
//! organization and routes blocked verdicts through a [`NotificationGate`] to
//! a [`Notifier`].

pub mod decision;
pub mod monitor;
pub mod notify;
pub mod verdict;

pub use decision::{AccessGuard, SuspensionPolicy};
pub use monitor::{AccessMonitor, Clock, DEFAULT_POLL_INTERVAL, MonitorBuilder, SystemClock};
pub use notify::{
    ChannelNotifier, DEFAULT_ACTION_LABEL, DEFAULT_BILLING_PATH, Notification, NotificationGate,
    NotificationPolicy, Notifier, TracingNotifier,
};
pub use verdict::{AccessAssessment, AccessVerdict, DenialReason};

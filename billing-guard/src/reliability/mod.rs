//! Retry support for collaborator fetches.
//!
//! The guard never retries on its own: a failed fetch resolves to the
//! loading state and the next poll tries again. Sources that talk to a
//! remote store can be wrapped in [`RetryingSubscriptionSource`] or
//! [`RetryingFailedPaymentSource`] to ride out short outages first.

mod retry;
mod sources;

pub use retry::{RetryPolicy, is_retryable, retry_with_backoff};
pub use sources::{RetryingFailedPaymentSource, RetryingSubscriptionSource};

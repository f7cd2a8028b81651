//! Retrying decorators for the collaborator traits.

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;

use super::retry::{RetryPolicy, retry_with_backoff};
use crate::{
    error::Result,
    payments::{FailedPaymentRecord, FailedPaymentSource},
    subscription::{OrganizationId, SubscriptionRecord, SubscriptionSource},
};

/// [`SubscriptionSource`] that retries transient fetch failures.
///
/// # Examples
///
/// ```
/// use billing_guard::{
///     reliability::{RetryPolicy, RetryingSubscriptionSource},
///     subscription::{
///         OrganizationId, StaticSubscriptionSource, SubscriptionRecord, resolve_subscription,
///     },
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> billing_guard::Result<()> {
/// let source = RetryingSubscriptionSource::new(
///     StaticSubscriptionSource::new(SubscriptionRecord::default()),
///     RetryPolicy::default(),
/// );
///
/// let snapshot = resolve_subscription(&source, &OrganizationId::new("org-1")?).await;
/// assert_eq!(source.inner().fetch_count(), 1);
/// # let _ = snapshot;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RetryingSubscriptionSource<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RetryingSubscriptionSource<S> {
    /// Wraps `inner` with `policy`.
    #[must_use]
    pub const fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Returns the wrapped source.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: SubscriptionSource> SubscriptionSource for RetryingSubscriptionSource<S> {
    fn fetch<'a>(
        &'a self,
        organization: &'a OrganizationId,
    ) -> impl Future<Output = Result<SubscriptionRecord>> + Send + 'a {
        retry_with_backoff(&self.policy, move || self.inner.fetch(organization))
    }
}

/// [`FailedPaymentSource`] that retries transient fetch failures.
#[derive(Debug)]
pub struct RetryingFailedPaymentSource<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RetryingFailedPaymentSource<S> {
    /// Wraps `inner` with `policy`.
    #[must_use]
    pub const fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Returns the wrapped source.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: FailedPaymentSource> FailedPaymentSource for RetryingFailedPaymentSource<S> {
    fn fetch<'a>(
        &'a self,
        organization: &'a OrganizationId,
    ) -> impl Future<Output = Result<FailedPaymentRecord>> + Send + 'a {
        retry_with_backoff(&self.policy, move || self.inner.fetch(organization))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::{
        error::GuardError,
        payments::{StaticFailedPaymentSource, resolve_failed_payments},
        subscription::{StaticSubscriptionSource, resolve_subscription},
    };

    /// Fails the first `failures` fetches, then serves a paid subscription.
    struct FlakySource {
        failures: u32,
        calls: AtomicU32,
    }

    impl SubscriptionSource for FlakySource {
        fn fetch<'a>(
            &'a self,
            _organization: &'a OrganizationId,
        ) -> impl Future<Output = Result<SubscriptionRecord>> + Send + 'a {
            async move {
                if self.calls.fetch_add(1, Ordering::Relaxed) < self.failures {
                    return Err(GuardError::SourceUnavailable("503 from store".to_owned()));
                }
                Ok(SubscriptionRecord {
                    subscribed: Some(true),
                    is_trial_active: Some(false),
                    ..SubscriptionRecord::default()
                })
            }
        }
    }

    fn org() -> OrganizationId {
        OrganizationId::new("org-retry").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_flaky_subscription_source_recovers() {
        let source = RetryingSubscriptionSource::new(
            FlakySource { failures: 2, calls: AtomicU32::new(0) },
            RetryPolicy::default(),
        );

        let snapshot = resolve_subscription(&source, &org()).await;

        assert!(snapshot.is_settled());
        assert_eq!(snapshot.state.subscribed, Some(true));
        assert_eq!(source.inner().calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fail_open() {
        let source = RetryingSubscriptionSource::new(
            FlakySource { failures: 10, calls: AtomicU32::new(0) },
            RetryPolicy::with_max_attempts(4),
        );

        let snapshot = resolve_subscription(&source, &org()).await;

        assert!(snapshot.loading);
        assert_eq!(source.inner().calls.load(Ordering::Relaxed), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_payment_source_retries() {
        let source = RetryingFailedPaymentSource::new(
            StaticFailedPaymentSource::failing("connection refused"),
            RetryPolicy::with_max_attempts(3),
        );

        let state = resolve_failed_payments(&source, &org()).await;

        assert_eq!(state.failed_count, 0);
        assert_eq!(source.inner().fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_success() {
        let source = RetryingSubscriptionSource::new(
            StaticSubscriptionSource::new(SubscriptionRecord::default()),
            RetryPolicy::default(),
        );

        let _ = resolve_subscription(&source, &org()).await;

        assert_eq!(source.inner().fetch_count(), 1);
    }
}

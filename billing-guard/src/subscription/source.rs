//! Subscription source collaborator.

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;
use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::state::{OrganizationId, SubscriptionRecord, SubscriptionSnapshot};
use crate::error::{GuardError, Result};

/// Reads the billing row of an organization from the hosted store.
///
/// Implementations own any transport concerns (connection pooling,
/// authentication, retries). Wrap an implementation in
/// [`RetryingSubscriptionSource`](crate::reliability::RetryingSubscriptionSource)
/// to add exponential backoff.
pub trait SubscriptionSource: Send + Sync {
    /// Fetches the current billing row.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::SourceUnavailable`] if the store cannot be read.
    fn fetch<'a>(
        &'a self,
        organization: &'a OrganizationId,
    ) -> impl Future<Output = Result<SubscriptionRecord>> + Send + 'a;
}

impl<S: SubscriptionSource> SubscriptionSource for Arc<S> {
    fn fetch<'a>(
        &'a self,
        organization: &'a OrganizationId,
    ) -> impl Future<Output = Result<SubscriptionRecord>> + Send + 'a {
        (**self).fetch(organization)
    }
}

/// Fetches and parses the subscription state of an organization.
///
/// Never fails: a fetch error or an unparseable record is logged and
/// reported as [`SubscriptionSnapshot::loading`], which the guard maps to
/// "allow access, keep loading". A transient read failure must not lock a
/// paying customer out.
#[instrument(skip(source), fields(organization = %organization))]
pub async fn resolve_subscription<S: SubscriptionSource>(
    source: &S,
    organization: &OrganizationId,
) -> SubscriptionSnapshot {
    let record = match source.fetch(organization).await {
        Ok(record) => record,
        Err(error) => {
            warn!(error = %error, "Subscription fetch failed, treating as unresolved");
            return SubscriptionSnapshot::loading();
        }
    };

    match record.into_state() {
        Ok(state) => {
            debug!(
                subscribed = ?state.subscribed,
                is_trial_active = ?state.is_trial_active,
                is_cancelled = state.is_cancelled,
                "Subscription state resolved"
            );
            SubscriptionSnapshot::resolved(state)
        }
        Err(error) => {
            warn!(error = %error, "Subscription record malformed, treating as unresolved");
            SubscriptionSnapshot::loading()
        }
    }
}

/// In-memory subscription source.
///
/// Serves a fixed record (or a fixed failure) for every organization.
/// Useful for tests, local development, and the operator CLI.
///
/// # Examples
///
/// ```
/// use billing_guard::subscription::{
///     OrganizationId, StaticSubscriptionSource, SubscriptionRecord, resolve_subscription,
/// };
///
/// # async fn example() -> billing_guard::Result<()> {
/// let source = StaticSubscriptionSource::new(SubscriptionRecord {
///     subscribed: Some(true),
///     is_trial_active: Some(false),
///     ..SubscriptionRecord::default()
/// });
///
/// let org = OrganizationId::new("org-1")?;
/// let snapshot = resolve_subscription(&source, &org).await;
/// assert!(snapshot.is_settled());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StaticSubscriptionSource {
    response: RwLock<std::result::Result<SubscriptionRecord, String>>,
    fetches: AtomicU32,
}

impl StaticSubscriptionSource {
    /// Creates a source that serves `record`.
    #[must_use]
    pub fn new(record: SubscriptionRecord) -> Self {
        Self { response: RwLock::new(Ok(record)), fetches: AtomicU32::new(0) }
    }

    /// Creates a source whose every fetch fails with `message`.
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self { response: RwLock::new(Err(message.into())), fetches: AtomicU32::new(0) }
    }

    /// Replaces the served record.
    pub async fn set(&self, record: SubscriptionRecord) {
        *self.response.write().await = Ok(record);
    }

    /// Makes subsequent fetches fail with `message`.
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub async fn fail(&self, message: impl Into<String>) {
        *self.response.write().await = Err(message.into());
    }

    /// Number of fetches served so far.
    #[must_use]
    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl SubscriptionSource for StaticSubscriptionSource {
    fn fetch<'a>(
        &'a self,
        _organization: &'a OrganizationId,
    ) -> impl Future<Output = Result<SubscriptionRecord>> + Send + 'a {
        async move {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            self.response.read().await.clone().map_err(GuardError::SourceUnavailable)
        }
    }
}

//! Failed-payment source collaborator.

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
use tracing::{debug, error, instrument};

use super::grace::{FailedPaymentRecord, FailedPaymentState};
use crate::{
    error::{GuardError, Result},
    subscription::OrganizationId,
};

/// Reads the failed-payment counter of an organization.
pub trait FailedPaymentSource: Send + Sync {
    /// Fetches the failed-payment row.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::SourceUnavailable`] if the store cannot be read.
    fn fetch<'a>(
        &'a self,
        organization: &'a OrganizationId,
    ) -> impl Future<Output = Result<FailedPaymentRecord>> + Send + 'a;
}

impl<S: FailedPaymentSource> FailedPaymentSource for Arc<S> {
    fn fetch<'a>(
        &'a self,
        organization: &'a OrganizationId,
    ) -> impl Future<Output = Result<FailedPaymentRecord>> + Send + 'a {
        (**self).fetch(organization)
    }
}

/// Fetches and parses the failed-payment state of an organization.
///
/// A read error is logged and reported as [`FailedPaymentState::none`]:
/// the tracker fails open rather than blocking users on a transient error.
#[instrument(skip(source), fields(organization = %organization))]
pub async fn resolve_failed_payments<S: FailedPaymentSource>(
    source: &S,
    organization: &OrganizationId,
) -> FailedPaymentState {
    let parsed = match source.fetch(organization).await {
        Ok(record) => record.into_state(),
        Err(e) => Err(e),
    };

    match parsed {
        Ok(state) => {
            debug!(failed_count = state.failed_count, "Failed-payment state resolved");
            state
        }
        Err(e) => {
            error!(error = %e, "Failed to read failed-payment status, assuming none");
            FailedPaymentState::none()
        }
    }
}

/// In-memory failed-payment source.
#[derive(Debug)]
pub struct StaticFailedPaymentSource {
    response: RwLock<std::result::Result<FailedPaymentRecord, String>>,
    fetches: AtomicU32,
}

impl StaticFailedPaymentSource {
    /// Creates a source that serves `record`.
    #[must_use]
    pub fn new(record: FailedPaymentRecord) -> Self {
        Self { response: RwLock::new(Ok(record)), fetches: AtomicU32::new(0) }
    }

    /// Creates a source reporting no failed payments.
    #[must_use]
    pub fn clean() -> Self {
        Self::new(FailedPaymentRecord::default())
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
    pub async fn set(&self, record: FailedPaymentRecord) {
        *self.response.write().await = Ok(record);
    }

    /// Number of fetches served so far.
    #[must_use]
    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl FailedPaymentSource for StaticFailedPaymentSource {
    fn fetch<'a>(
        &'a self,
        _organization: &'a OrganizationId,
    ) -> impl Future<Output = Result<FailedPaymentRecord>> + Send + 'a {
        async move {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            self.response.read().await.clone().map_err(GuardError::SourceUnavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> OrganizationId {
        OrganizationId::new("org-payments").unwrap()
    }

    #[tokio::test]
    async fn test_resolve_success() {
        let source = StaticFailedPaymentSource::new(FailedPaymentRecord {
            failed_count: 2,
            last_payment_attempt: Some("2025-01-10T08:00:00Z".to_owned()),
        });

        let state = resolve_failed_payments(&source, &org()).await;

        assert_eq!(state.failed_count, 2);
        assert!(state.last_payment_attempt.is_some());
    }

    #[tokio::test]
    async fn test_resolve_failure_fails_open() {
        let source = StaticFailedPaymentSource::failing("permission denied for table");

        let state = resolve_failed_payments(&source, &org()).await;

        assert_eq!(state, FailedPaymentState::none());
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_malformed_fails_open() {
        let source = StaticFailedPaymentSource::new(FailedPaymentRecord {
            failed_count: 5,
            last_payment_attempt: Some("garbage".to_owned()),
        });

        let state = resolve_failed_payments(&source, &org()).await;

        assert_eq!(state, FailedPaymentState::none());
    }

    #[tokio::test]
    async fn test_set_replaces_record() {
        let source = StaticFailedPaymentSource::clean();
        assert_eq!(resolve_failed_payments(&source, &org()).await.failed_count, 0);

        source.set(FailedPaymentRecord { failed_count: 4, last_payment_attempt: None }).await;

        assert_eq!(resolve_failed_payments(&source, &org()).await.failed_count, 4);
    }
}

//! Background re-evaluation of an organization's access verdict.
//!
//! An [`AccessMonitor`] owns one tokio task per organization. The task
//! resolves both collaborators, evaluates the [`AccessGuard`], publishes the
//! result on a `watch` channel, and hands blocked verdicts to the
//! notification gate. It runs:
//!
//! - immediately after spawning,
//! - every `poll_interval` (default 5 minutes),
//! - whenever [`AccessMonitor::refresh`] is called (upstream change, e.g. a
//!   login or a billing webhook).
//!
//! Dropping the monitor cancels the task.
//!
//! # Examples
//!
//! ```
//! use billing_guard::{
//!     guard::{AccessGuard, AccessMonitor},
//!     payments::StaticFailedPaymentSource,
//!     subscription::{OrganizationId, StaticSubscriptionSource, SubscriptionRecord},
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> billing_guard::Result<()> {
//! let subscriptions = StaticSubscriptionSource::new(SubscriptionRecord {
//!     subscribed: Some(true),
//!     is_trial_active: Some(false),
//!     ..SubscriptionRecord::default()
//! });
//!
//! let monitor = AccessMonitor::builder(OrganizationId::new("org-1")?, AccessGuard::default())
//!     .spawn(subscriptions, StaticFailedPaymentSource::clean());
//!
//! let mut updates = monitor.subscribe();
//! updates.changed().await.map_err(|_| billing_guard::GuardError::MonitorClosed)?;
//! assert!(updates.borrow().verdict.has_access);
//! # Ok(())
//! # }
//! ```

use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        watch,
    },
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, instrument, warn};

use super::{
    decision::AccessGuard,
    notify::{NotificationGate, NotificationPolicy, Notifier, TracingNotifier},
    verdict::{AccessAssessment, AccessVerdict},
};
use crate::{
    audit::{AccessAuditEvent, audit_log},
    error::{GuardError, Result},
    payments::{FailedPaymentSource, resolve_failed_payments},
    subscription::{OrganizationId, SubscriptionSource, resolve_subscription},
};

/// Default re-evaluation interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Shortest interval the monitor accepts.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Source of "now" for evaluations.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Configures and spawns an [`AccessMonitor`].
pub struct MonitorBuilder {
    organization: OrganizationId,
    guard: AccessGuard,
    poll_interval: Duration,
    notifications: NotificationPolicy,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for MonitorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorBuilder")
            .field("organization", &self.organization)
            .field("guard", &self.guard)
            .field("poll_interval", &self.poll_interval)
            .field("notifications", &self.notifications)
            .finish_non_exhaustive()
    }
}

impl MonitorBuilder {
    /// Sets the re-evaluation interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Sets the notification policy.
    #[must_use]
    pub fn notification_policy(mut self, policy: NotificationPolicy) -> Self {
        self.notifications = policy;
        self
    }

    /// Sets where notifications are delivered (default: [`TracingNotifier`]).
    #[must_use]
    pub fn notifier<N: Notifier + 'static>(mut self, notifier: N) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Sets the clock (default: [`SystemClock`]).
    #[must_use]
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Spawns the monitoring task on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn<S, P>(self, subscriptions: S, payments: P) -> AccessMonitor
    where
        S: SubscriptionSource + 'static,
        P: FailedPaymentSource + 'static,
    {
        let (assessment_tx, assessment_rx) = watch::channel(AccessAssessment::default());
        // One pending refresh is enough: it re-reads everything.
        let (refresh_tx, refresh_rx) = mpsc::channel(1);

        let worker = Worker {
            organization: self.organization.clone(),
            guard: self.guard,
            subscriptions,
            payments,
            gate: NotificationGate::new(self.notifications),
            notifier: self.notifier,
            clock: self.clock,
            last_verdict: None,
        };

        info!(
            organization = %self.organization,
            poll_interval_secs = self.poll_interval.as_secs(),
            suspension_policy = ?self.guard.suspension_policy(),
            "Starting access monitor"
        );
        let task = tokio::spawn(run(worker, refresh_rx, assessment_tx, self.poll_interval));

        AccessMonitor {
            organization: self.organization,
            assessments: assessment_rx,
            refresh_tx,
            task: Some(task),
        }
    }
}

/// Handle to a running access monitor.
///
/// Until the first evaluation completes the published verdict is
/// [`AccessVerdict::loading`], which allows access.
#[derive(Debug)]
pub struct AccessMonitor {
    organization: OrganizationId,
    assessments: watch::Receiver<AccessAssessment>,
    refresh_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl AccessMonitor {
    /// Starts configuring a monitor for `organization`.
    #[must_use]
    pub fn builder(organization: OrganizationId, guard: AccessGuard) -> MonitorBuilder {
        MonitorBuilder {
            organization,
            guard,
            poll_interval: DEFAULT_POLL_INTERVAL,
            notifications: NotificationPolicy::default(),
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(SystemClock),
        }
    }

    /// Organization being monitored.
    #[must_use]
    pub fn organization(&self) -> &OrganizationId {
        &self.organization
    }

    /// Latest verdict.
    #[must_use]
    pub fn current(&self) -> AccessVerdict {
        self.assessments.borrow().verdict.clone()
    }

    /// Latest verdict with grace-period details.
    #[must_use]
    pub fn assessment(&self) -> AccessAssessment {
        self.assessments.borrow().clone()
    }

    /// Returns a receiver that observes every evaluation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AccessAssessment> {
        self.assessments.clone()
    }

    /// Requests an immediate re-evaluation.
    ///
    /// Requests made while one is already pending are coalesced.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::MonitorClosed`] if the task has stopped.
    pub fn refresh(&self) -> Result<()> {
        match self.refresh_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => Ok(()),
            Err(TrySendError::Closed(())) => Err(GuardError::MonitorClosed),
        }
    }

    /// Returns `true` while the background task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the task and waits for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(e) = task.await
                && !e.is_cancelled()
            {
                warn!(organization = %self.organization, error = %e, "Access monitor task failed");
            }
        }
        debug!(organization = %self.organization, "Access monitor stopped");
    }
}

impl Drop for AccessMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Worker<S, P> {
    organization: OrganizationId,
    guard: AccessGuard,
    subscriptions: S,
    payments: P,
    gate: NotificationGate,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    last_verdict: Option<AccessVerdict>,
}

impl<S: SubscriptionSource, P: FailedPaymentSource> Worker<S, P> {
    #[instrument(skip(self), fields(organization = %self.organization))]
    async fn evaluate(&mut self) -> AccessAssessment {
        let (snapshot, payments) = tokio::join!(
            resolve_subscription(&self.subscriptions, &self.organization),
            resolve_failed_payments(&self.payments, &self.organization),
        );

        let assessment = self.guard.assess(&snapshot, &payments, self.clock.now());
        let verdict = &assessment.verdict;

        if self.last_verdict.as_ref() != Some(verdict) {
            audit_log(&AccessAuditEvent::new(
                &self.organization,
                self.last_verdict.as_ref(),
                verdict,
            ));
            self.last_verdict = Some(verdict.clone());
        }

        if let Some(notification) = self.gate.observe(verdict) {
            self.notifier.notify(&self.organization, notification);
        }

        debug!(
            has_access = verdict.has_access,
            is_loading = verdict.is_loading,
            reason = ?verdict.reason,
            "Access evaluated"
        );
        assessment
    }
}

async fn run<S, P>(
    mut worker: Worker<S, P>,
    mut refresh_rx: mpsc::Receiver<()>,
    assessment_tx: watch::Sender<AccessAssessment>,
    poll_interval: Duration,
) where
    S: SubscriptionSource,
    P: FailedPaymentSource,
{
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            request = refresh_rx.recv() => {
                if request.is_none() {
                    break;
                }
                ticker.reset();
            }
        }

        let assessment = worker.evaluate().await;
        assessment_tx.send_replace(assessment);
    }

    debug!(organization = %worker.organization, "Monitor handle dropped, stopping");
}

//! Integration tests for the access guard.
//!
//! Drives the public API end to end: wire records in, configuration from
//! TOML, verdicts out, and the background monitor.

use std::{sync::Arc, time::Duration};

use billing_guard::{
    GuardConfig, GuardError,
    guard::{AccessGuard, AccessMonitor, AccessVerdict, ChannelNotifier, DenialReason, SuspensionPolicy},
    payments::{FailedPaymentRecord, FailedPaymentState, StaticFailedPaymentSource},
    reliability::{RetryingFailedPaymentSource, RetryingSubscriptionSource},
    subscription::{
        OrganizationId, StaticSubscriptionSource, SubscriptionRecord, SubscriptionSnapshot,
        resolve_subscription,
    },
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};

fn record(
    subscribed: bool,
    is_trial_active: bool,
    is_cancelled: bool,
    trial_end: Option<DateTime<Utc>>,
) -> SubscriptionRecord {
    SubscriptionRecord {
        subscribed: Some(subscribed),
        is_trial_active: Some(is_trial_active),
        is_cancelled,
        trial_end_date: trial_end.map(|t| t.to_rfc3339()),
    }
}

fn evaluate(guard: &AccessGuard, record: SubscriptionRecord, failures: FailedPaymentState) -> AccessVerdict {
    let snapshot = SubscriptionSnapshot::resolved(record.into_state().expect("valid record"));
    guard.evaluate(&snapshot, &failures, Utc::now())
}

#[test]
fn test_wire_record_from_json() {
    let json = r#"{
        "subscribed": false,
        "isTrialActive": false,
        "isCancelled": false,
        "trialEndDate": "2020-03-01T00:00:00+00:00"
    }"#;

    let record: SubscriptionRecord = serde_json::from_str(json).expect("should parse record");
    let verdict = evaluate(&AccessGuard::default(), record, FailedPaymentState::none());

    assert_eq!(verdict, AccessVerdict::denied(DenialReason::TrialExpired));
    let out = serde_json::to_value(&verdict).expect("should serialize verdict");
    assert_eq!(out["hasAccess"], false);
    assert_eq!(out["reason"], "trial_expired");
}

#[test]
fn test_null_flags_from_json_are_loading() {
    let record: SubscriptionRecord =
        serde_json::from_str(r#"{"subscribed": null, "isTrialActive": true}"#)
            .expect("should parse record");

    let verdict = evaluate(&AccessGuard::default(), record, FailedPaymentState::none());

    assert_eq!(verdict, AccessVerdict::loading());
}

#[test]
fn test_cancelled_without_trial_history() {
    let verdict = evaluate(
        &AccessGuard::default(),
        record(false, false, true, None),
        FailedPaymentState::none(),
    );
    assert_eq!(verdict.reason, Some(DenialReason::SubscriptionCancelled));
}

#[test]
fn test_new_user_path_allows() {
    let verdict = evaluate(
        &AccessGuard::default(),
        record(false, false, false, None),
        FailedPaymentState::none(),
    );
    assert!(verdict.has_access);
    assert!(!verdict.is_loading);
}

#[test]
fn test_future_trial_end_without_subscription() {
    let verdict = evaluate(
        &AccessGuard::default(),
        record(false, false, false, Some(Utc::now() + ChronoDuration::days(3))),
        FailedPaymentState::none(),
    );
    assert_eq!(verdict.reason, Some(DenialReason::NoSubscription));
}

#[test]
fn test_subscriber_with_three_failures_per_policy() {
    let failures = FailedPaymentState { failed_count: 3, last_payment_attempt: None };
    let subscriber = || record(true, false, false, None);

    for (policy, expected) in [
        (SuspensionPolicy::ShortCircuit, AccessVerdict::granted()),
        (SuspensionPolicy::Immediate, AccessVerdict::denied(DenialReason::GracePeriodExpired)),
        (SuspensionPolicy::AfterGrace, AccessVerdict::denied(DenialReason::GracePeriodExpired)),
    ] {
        let guard = AccessGuard::new(Default::default(), policy);
        assert_eq!(evaluate(&guard, subscriber(), failures), expected, "{policy:?}");
    }
}

#[test]
fn test_config_drives_guard() {
    let config = GuardConfig::from_toml(
        r#"
        [grace]
        threshold = 2
        duration_days = 3

        [monitor]
        suspension_policy = "after_grace"
        "#,
    )
    .expect("should parse config");
    let guard = config.guard();
    let subscriber = || record(true, false, false, None);

    let inside = FailedPaymentState {
        failed_count: 2,
        last_payment_attempt: Some(Utc::now() - ChronoDuration::days(1)),
    };
    let outside = FailedPaymentState {
        failed_count: 2,
        last_payment_attempt: Some(Utc::now() - ChronoDuration::days(4)),
    };

    assert!(evaluate(&guard, subscriber(), inside).has_access);
    assert_eq!(
        evaluate(&guard, subscriber(), outside).reason,
        Some(DenialReason::GracePeriodExpired)
    );
}

#[test]
fn test_invalid_config_rejected() {
    let err = GuardConfig::from_toml("[grace]\nduration_days = 400").expect_err("should reject");
    assert!(matches!(err, GuardError::ConfigError(_)));
}

#[tokio::test(start_paused = true)]
async fn test_monitor_from_config_end_to_end() {
    let config = GuardConfig::from_toml(
        r#"
        [monitor]
        poll_interval_secs = 30

        [notifications]
        billing_path = "/settings/billing"
        "#,
    )
    .expect("should parse config");

    let subscriptions = Arc::new(StaticSubscriptionSource::new(record(true, false, false, None)));
    let payments = Arc::new(StaticFailedPaymentSource::clean());
    let (notifier, mut notifications) = ChannelNotifier::channel();
    let org = OrganizationId::new("org-e2e").expect("valid id");

    let monitor = AccessMonitor::builder(org.clone(), config.guard())
        .poll_interval(config.poll_interval())
        .notification_policy(config.notification_policy())
        .notifier(notifier)
        .spawn(
            RetryingSubscriptionSource::new(Arc::clone(&subscriptions), config.retry_policy()),
            RetryingFailedPaymentSource::new(Arc::clone(&payments), config.retry_policy()),
        );
    let mut updates = monitor.subscribe();

    updates.changed().await.expect("monitor running");
    assert_eq!(monitor.current(), AccessVerdict::granted());

    payments
        .set(FailedPaymentRecord {
            failed_count: 4,
            last_payment_attempt: Some((Utc::now() - ChronoDuration::days(30)).to_rfc3339()),
        })
        .await;
    monitor.refresh().expect("monitor running");
    updates.changed().await.expect("monitor running");

    assert_eq!(monitor.current(), AccessVerdict::denied(DenialReason::GracePeriodExpired));
    assert_eq!(monitor.assessment().failed_count, 4);

    let (to, notification) = notifications.recv().await.expect("notification sent");
    assert_eq!(to, org);
    assert_eq!(notification.action_target, "/settings/billing");

    payments.set(FailedPaymentRecord::default()).await;
    tokio::time::advance(Duration::from_secs(30)).await;
    updates.changed().await.expect("monitor running");

    assert!(monitor.current().has_access);
    monitor.shutdown().await;
}

#[tokio::test]
async fn test_resolve_through_retrying_source() {
    let source = RetryingSubscriptionSource::new(
        StaticSubscriptionSource::new(record(false, true, false, None)),
        GuardConfig::default().retry_policy(),
    );
    let org = OrganizationId::new("org-retry").expect("valid id");

    let snapshot = resolve_subscription(&source, &org).await;

    assert!(snapshot.is_settled());
    assert_eq!(source.inner().fetch_count(), 1);
}

//! Benchmarks for access evaluation.
//!
//! Measures the pure decision path per rule branch, record parsing, and a
//! full resolve-and-evaluate pass against in-memory sources.
//!
//! Run with: `cargo bench --bench evaluate_throughput`

#![allow(clippy::let_underscore_must_use, reason = "Criterion benchmarks ignore results")]
#![allow(missing_docs, reason = "Benchmark functions are self-documenting")]

use std::hint::black_box;

use billing_guard::{
    guard::{AccessGuard, SuspensionPolicy},
    payments::{
        FailedPaymentRecord, FailedPaymentState, GracePolicy, StaticFailedPaymentSource,
        resolve_failed_payments,
    },
    subscription::{
        OrganizationId, StaticSubscriptionSource, SubscriptionRecord, SubscriptionSnapshot,
        SubscriptionState, resolve_subscription,
    },
};
use chrono::{Duration, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

fn snapshot(subscribed: bool, is_trial_active: bool, trial_end_days: Option<i64>) -> SubscriptionSnapshot {
    SubscriptionSnapshot::resolved(SubscriptionState {
        subscribed: Some(subscribed),
        is_trial_active: Some(is_trial_active),
        is_cancelled: false,
        trial_end_date: trial_end_days.map(|d| Utc::now() + Duration::days(d)),
    })
}

/// One evaluation per rule branch
fn bench_evaluate_branches(c: &mut Criterion) {
    let _ = tracing_subscriber::fmt().with_max_level(tracing::Level::ERROR).try_init();

    let mut group = c.benchmark_group("evaluate");
    let now = Utc::now();
    let failures = FailedPaymentState {
        failed_count: 3,
        last_payment_attempt: Some(now - Duration::days(2)),
    };

    let cases = [
        ("loading", SubscriptionSnapshot::loading()),
        ("trial_active", snapshot(false, true, Some(5))),
        ("subscribed", snapshot(true, false, None)),
        ("trial_expired", snapshot(false, false, Some(-5))),
        ("no_subscription", snapshot(false, false, Some(5))),
    ];

    for policy in [SuspensionPolicy::ShortCircuit, SuspensionPolicy::AfterGrace] {
        let guard = AccessGuard::new(GracePolicy::default(), policy);
        for (name, snap) in &cases {
            group.bench_with_input(BenchmarkId::new(format!("{policy:?}"), name), snap, |b, snap| {
                b.iter(|| guard.assess(black_box(snap), black_box(&failures), black_box(now)));
            });
        }
    }

    group.finish();
}

/// Wire record to parsed state
fn bench_record_parsing(c: &mut Criterion) {
    let rfc3339 = SubscriptionRecord {
        subscribed: Some(false),
        is_trial_active: Some(false),
        is_cancelled: false,
        trial_end_date: Some("2025-03-01T12:30:00+00:00".to_owned()),
    };
    let postgres = SubscriptionRecord {
        trial_end_date: Some("2025-03-01 12:30:00.123456+00".to_owned()),
        ..rfc3339.clone()
    };

    c.bench_function("parse_record_rfc3339", |b| {
        b.iter(|| black_box(rfc3339.clone()).into_state());
    });
    c.bench_function("parse_record_postgres", |b| {
        b.iter(|| black_box(postgres.clone()).into_state());
    });
}

/// Resolve both sources and evaluate
fn bench_resolve_and_evaluate(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        return;
    };
    let Ok(org) = OrganizationId::new("org-bench") else {
        return;
    };
    let subscriptions = StaticSubscriptionSource::new(SubscriptionRecord {
        subscribed: Some(true),
        is_trial_active: Some(false),
        ..SubscriptionRecord::default()
    });
    let payments = StaticFailedPaymentSource::new(FailedPaymentRecord {
        failed_count: 1,
        last_payment_attempt: Some(Utc::now().to_rfc3339()),
    });
    let guard = AccessGuard::default();

    c.bench_function("resolve_and_evaluate", |b| {
        b.to_async(&runtime).iter(|| async {
            let snapshot = resolve_subscription(&subscriptions, &org).await;
            let failures = resolve_failed_payments(&payments, &org).await;
            black_box(guard.assess(&snapshot, &failures, Utc::now()))
        });
    });
}

criterion_group!(benches, bench_evaluate_branches, bench_record_parsing, bench_resolve_and_evaluate);
criterion_main!(benches);

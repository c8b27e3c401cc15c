#[path = "common/mod.rs"]
mod common;

use beacon::domain::{CheckStatus, ServiceStatus};
use beacon::probe::{FailureKind, ProbeOutcome};
use beacon::store::memory::FaultMode;
use beacon::store::MemoryStore;
use common::{build_state, service, test_config, FailingSink, RecordingSink, StubProber};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn healthy_probe_resurrects_dead_service_and_notifies() {
    let store = MemoryStore::new();
    store
        .insert_service(service(1, "x.com", ServiceStatus::Dead))
        .await;
    let (sink, mut transitions) = RecordingSink::new();
    let state = build_state(
        &test_config(),
        &store,
        StubProber::responding(200, 120),
        sink,
    );

    let evaluation = state.evaluator.evaluate("x.com").await.expect("evaluation");
    assert_eq!(evaluation.result.status, CheckStatus::Up);
    assert_eq!(evaluation.result.response_time, 120);

    evaluation
        .background
        .expect("healthy results schedule resurrection")
        .await
        .expect("resurrection task");

    let updated = store.service(1).await.expect("service");
    assert_eq!(updated.status, ServiceStatus::Up);
    assert_eq!(updated.response_time, Some(120));
    assert_eq!(updated.last_checked, Some(evaluation.result.checked_at));

    let batch = transitions.try_recv().expect("transition delivered");
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].service_id, 1);
    assert_eq!(batch[0].domain, "x.com");
    assert_eq!(batch[0].previous_status, ServiceStatus::Dead);
    assert_eq!(batch[0].new_status, ServiceStatus::Up);
}

#[tokio::test]
async fn slow_probe_resurrects_as_slow() {
    let store = MemoryStore::new();
    store
        .insert_service(service(1, "x.com", ServiceStatus::Dead))
        .await;
    let (sink, mut transitions) = RecordingSink::new();
    let state = build_state(
        &test_config(),
        &store,
        StubProber::responding(200, 1500),
        sink,
    );

    let evaluation = state.evaluator.evaluate("x.com").await.expect("evaluation");
    assert_eq!(evaluation.result.status, CheckStatus::Slow);
    evaluation
        .background
        .expect("slow is healthy")
        .await
        .expect("resurrection task");

    assert_eq!(
        store.service(1).await.expect("service").status,
        ServiceStatus::Slow
    );
    let batch = transitions.try_recv().expect("transition delivered");
    assert_eq!(batch[0].new_status, ServiceStatus::Slow);
}

#[tokio::test]
async fn down_probe_never_resurrects() {
    let store = MemoryStore::new();
    store
        .insert_service(service(1, "x.com", ServiceStatus::Dead))
        .await;
    let (sink, mut transitions) = RecordingSink::new();
    let prober = StubProber::new(ProbeOutcome::Failure {
        kind: FailureKind::Connect,
        elapsed: Duration::from_millis(30),
    });
    let state = build_state(&test_config(), &store, prober, sink);

    let evaluation = state.evaluator.evaluate("x.com").await.expect("evaluation");
    assert_eq!(evaluation.result.status, CheckStatus::Down);
    assert_eq!(evaluation.result.status_code, 0);
    assert!(evaluation.background.is_none());

    tokio::task::yield_now().await;
    assert_eq!(
        store.service(1).await.expect("service").status,
        ServiceStatus::Dead
    );
    assert!(transitions.try_recv().is_err());
}

#[tokio::test]
async fn only_the_lowest_id_dead_service_is_resurrected() {
    let store = MemoryStore::new();
    store
        .insert_service(service(4, "x.com", ServiceStatus::Dead))
        .await;
    store
        .insert_service(service(2, "x.com", ServiceStatus::Dead))
        .await;
    let (sink, mut transitions) = RecordingSink::new();
    let state = build_state(&test_config(), &store, StubProber::responding(204, 50), sink);

    let evaluation = state.evaluator.evaluate("x.com").await.expect("evaluation");
    evaluation
        .background
        .expect("background")
        .await
        .expect("resurrection task");

    assert_eq!(
        store.service(2).await.expect("service").status,
        ServiceStatus::Up
    );
    assert_eq!(
        store.service(4).await.expect("service").status,
        ServiceStatus::Dead
    );

    let batch = transitions.try_recv().expect("transition delivered");
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].service_id, 2);
    assert!(transitions.try_recv().is_err());
}

#[tokio::test]
async fn services_not_dead_or_on_other_domains_are_untouched() {
    let store = MemoryStore::new();
    store
        .insert_service(service(1, "x.com", ServiceStatus::Down))
        .await;
    store
        .insert_service(service(2, "X.com", ServiceStatus::Dead))
        .await;
    store
        .insert_service(service(3, "y.com", ServiceStatus::Dead))
        .await;
    let (sink, mut transitions) = RecordingSink::new();
    let state = build_state(&test_config(), &store, StubProber::responding(200, 50), sink);

    let evaluation = state.evaluator.evaluate("x.com").await.expect("evaluation");
    evaluation
        .background
        .expect("background")
        .await
        .expect("resurrection task");

    assert_eq!(
        store.service(1).await.expect("service").status,
        ServiceStatus::Down
    );
    assert_eq!(
        store.service(2).await.expect("service").status,
        ServiceStatus::Dead
    );
    assert_eq!(
        store.service(3).await.expect("service").status,
        ServiceStatus::Dead
    );
    assert!(transitions.try_recv().is_err());
}

#[tokio::test]
async fn store_failure_is_absorbed() {
    let store = MemoryStore::new();
    store
        .insert_service(service(1, "x.com", ServiceStatus::Dead))
        .await;
    store.set_fault(FaultMode::Writes);
    let (sink, mut transitions) = RecordingSink::new();
    let state = build_state(&test_config(), &store, StubProber::responding(200, 80), sink);

    let evaluation = state.evaluator.evaluate("x.com").await.expect("evaluation");
    assert_eq!(evaluation.result.status, CheckStatus::Up);
    evaluation
        .background
        .expect("background")
        .await
        .expect("resurrection task absorbs the failure");

    store.set_fault(FaultMode::None);
    assert_eq!(
        store.service(1).await.expect("service").status,
        ServiceStatus::Dead
    );
    assert!(transitions.try_recv().is_err());
}

#[tokio::test]
async fn notification_failure_keeps_the_resurrection() {
    let store = MemoryStore::new();
    store
        .insert_service(service(1, "x.com", ServiceStatus::Dead))
        .await;
    let state = build_state(
        &test_config(),
        &store,
        StubProber::responding(200, 80),
        Arc::new(FailingSink),
    );

    let evaluation = state.evaluator.evaluate("x.com").await.expect("evaluation");
    evaluation
        .background
        .expect("background")
        .await
        .expect("delivery failure is absorbed");

    assert_eq!(
        store.service(1).await.expect("service").status,
        ServiceStatus::Up
    );
}

#[tokio::test]
async fn invalid_domain_is_rejected_before_probing() {
    let store = MemoryStore::new();
    let (sink, _transitions) = RecordingSink::new();
    let prober = StubProber::responding(200, 10);
    let state = build_state(&test_config(), &store, prober.clone(), sink);

    assert!(state.evaluator.evaluate("   ").await.is_err());
    assert!(state.evaluator.evaluate("x.com/path").await.is_err());
    assert_eq!(prober.calls(), 0);
}

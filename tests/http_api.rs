#[path = "common/mod.rs"]
mod common;

use axum::body::{to_bytes, Body};
use axum::http::{
    header::{CACHE_CONTROL, RETRY_AFTER},
    Request, StatusCode,
};
use axum::response::Response;
use axum::Router;
use beacon::domain::{CheckStatus, ServiceStatus};
use beacon::probe::{FailureKind, ProbeOutcome};
use beacon::store::memory::FaultMode;
use beacon::store::MemoryStore;
use chrono::{Duration as ChronoDuration, Utc};
use common::{
    build_state, build_state_with_store, service, test_config, RecordingSink, StalledSink,
    StalledStore, StubProber,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app(store: &MemoryStore, prober: Arc<StubProber>) -> Router {
    let (sink, _transitions) = RecordingSink::new();
    beacon::transport::router(build_state(&test_config(), store, prober, sink))
}

async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    )
    .await
    .expect("response")
}

async fn json_body(response: Response) -> JsonValue {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

fn cache_control(response: &Response) -> &str {
    response
        .headers()
        .get(CACHE_CONTROL)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn empty_domain_is_rejected_without_probing() {
    let prober = StubProber::responding(200, 10);
    let store = MemoryStore::new();

    for uri in ["/api/check/", "/api/check/%20%20"] {
        let response = get(app(&store, prober.clone()), uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {uri}");
        assert_eq!(cache_control(&response), "no-store");
        assert_eq!(json_body(response).await["error"], "INVALID_DOMAIN");
    }

    assert_eq!(prober.calls(), 0);
}

#[tokio::test]
async fn healthy_result_uses_long_cache_window() {
    let store = MemoryStore::new();
    let response = get(
        app(&store, StubProber::responding(200, 42)),
        "/api/check/example.com",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        cache_control(&response),
        "public, s-maxage=60, stale-while-revalidate=30"
    );

    let body = json_body(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["responseTime"], 42);
    assert_eq!(body["statusCode"], 200);
    assert!(body["checkedAt"].is_string());
}

#[tokio::test]
async fn down_result_uses_short_cache_window() {
    let store = MemoryStore::new();
    let prober = StubProber::new(ProbeOutcome::Failure {
        kind: FailureKind::Timeout,
        elapsed: Duration::from_secs(10),
    });

    let response = get(app(&store, prober), "/api/check/example.com").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        cache_control(&response),
        "public, s-maxage=30, stale-while-revalidate=15"
    );

    let body = json_body(response).await;
    assert_eq!(body["status"], "down");
    assert_eq!(body["statusCode"], 0);
    assert_eq!(body["responseTime"], 10_000);
}

#[tokio::test]
async fn resurrection_failure_does_not_alter_the_response() {
    let store = MemoryStore::new();
    store
        .insert_service(service(1, "example.com", ServiceStatus::Dead))
        .await;
    store.set_fault(FaultMode::All);

    let response = get(
        app(&store, StubProber::responding(200, 42)),
        "/api/check/example.com",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["responseTime"], 42);
}

#[tokio::test]
async fn saturated_probe_gate_returns_429() {
    let store = MemoryStore::new();
    let prober = StubProber::responding(200, 10);
    let mut config = test_config();
    config.server.max_concurrent_probes = Some(1);
    let (sink, _transitions) = RecordingSink::new();
    let state = build_state(&config, &store, prober.clone(), sink);
    let _in_flight = state
        .backpressure
        .try_acquire_now()
        .expect("only permit is free");
    let app = beacon::transport::router(state);

    let response = get(app, "/api/check/example.com").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok()),
        Some("1")
    );
    assert_eq!(json_body(response).await["error"], "LIMITS_ENFORCED");
    assert_eq!(prober.calls(), 0);
}

#[tokio::test]
async fn zero_probe_limit_does_not_throttle() {
    let store = MemoryStore::new();
    let mut config = test_config();
    config.server.max_concurrent_probes = Some(0);
    let (sink, _transitions) = RecordingSink::new();
    let app = beacon::transport::router(build_state(
        &config,
        &store,
        StubProber::responding(200, 10),
        sink,
    ));

    let response = get(app, "/api/check/example.com").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn undecodable_domain_gets_json_client_error() {
    let prober = StubProber::responding(200, 10);
    let store = MemoryStore::new();

    let response = get(app(&store, prober.clone()), "/api/check/%FF").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(cache_control(&response), "no-store");

    let body = json_body(response).await;
    assert_eq!(body["error"], "INVALID_DOMAIN");
    assert!(body["detail"].is_string());
    assert_eq!(prober.calls(), 0);
}

#[tokio::test]
async fn response_does_not_wait_for_a_stuck_store() {
    let (sink, _transitions) = RecordingSink::new();
    let app = beacon::transport::router(build_state_with_store(
        &test_config(),
        Arc::new(StalledStore),
        StubProber::responding(200, 42),
        sink,
    ));

    let response = tokio::time::timeout(
        Duration::from_secs(2),
        get(app, "/api/check/x.com"),
    )
    .await
    .expect("check returns while resurrection is stuck");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["responseTime"], 42);
    assert_eq!(body["statusCode"], 200);
}

#[tokio::test]
async fn response_does_not_wait_for_a_stuck_notification() {
    let store = MemoryStore::new();
    store
        .insert_service(service(1, "x.com", ServiceStatus::Dead))
        .await;
    let app = beacon::transport::router(build_state(
        &test_config(),
        &store,
        StubProber::responding(200, 42),
        Arc::new(StalledSink),
    ));

    let response = tokio::time::timeout(
        Duration::from_secs(2),
        get(app, "/api/check/x.com"),
    )
    .await
    .expect("check returns while delivery is stuck");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "up");
}

#[tokio::test]
async fn service_read_api_reports_cached_status_and_uptime() {
    let store = MemoryStore::new();
    store
        .insert_service(service(7, "status.example.com", ServiceStatus::Up))
        .await;
    let now = Utc::now();
    store
        .insert_check(7, CheckStatus::Down, 0, 0, now - ChronoDuration::days(3))
        .await;
    store
        .insert_check(7, CheckStatus::Up, 100, 200, now - ChronoDuration::hours(2))
        .await;
    store
        .insert_check(7, CheckStatus::Slow, 1500, 200, now - ChronoDuration::hours(1))
        .await;

    let response = get(
        app(&store, StubProber::responding(200, 10)),
        "/api/v1/services/service-7",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["service"]["id"], 7);
    assert_eq!(body["service"]["status"], "up");
    assert_eq!(body["uptime"]["last24h"]["totalChecks"], 2);
    assert_eq!(body["uptime"]["last24h"]["uptimePercent"], 100.0);
    assert_eq!(body["uptime"]["last7d"]["totalChecks"], 3);
    assert_eq!(body["uptime"]["last7d"]["down"], 1);
    assert_eq!(
        body["uptime"]["last7d"]["incidents"]
            .as_array()
            .map(Vec::len),
        Some(1)
    );
}

#[tokio::test]
async fn unknown_service_is_404() {
    let store = MemoryStore::new();
    let response = get(
        app(&store, StubProber::responding(200, 10)),
        "/api/v1/services/missing",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reflects_datastore_reachability() {
    let store = MemoryStore::new();
    let prober = StubProber::responding(200, 10);

    let response = get(app(&store, prober.clone()), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");

    store.set_fault(FaultMode::Reads);
    let response = get(app(&store, prober), "/health").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["status"], "degraded");
}

#[tokio::test]
async fn metrics_endpoint_renders_prometheus_text() {
    let store = MemoryStore::new();
    let prober = StubProber::responding(200, 10);

    let _ = get(app(&store, prober.clone()), "/api/check/example.com").await;
    let response = get(app(&store, prober), "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8");
    assert!(text.contains("# TYPE beacon_probes_total counter"));
    assert!(text.contains("beacon_backpressure_probe_"));
    assert!(text.contains("route=\"/api/check/:domain\""));
}

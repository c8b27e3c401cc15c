use crate::app_state::AppState;
use crate::metrics::{
    metrics as metrics_collector, push_metric, HttpMetricsSnapshot, RuntimeCountersSnapshot,
    PROBE_BACKPRESSURE_METRICS,
};
use axum::http::{
    header::{CACHE_CONTROL, CONTENT_TYPE},
    StatusCode,
};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde_json::json;

pub fn routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

async fn health(Extension(state): Extension<AppState>) -> Response {
    let timestamp = Utc::now().to_rfc3339();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            [(CACHE_CONTROL, "no-store")],
            Json(json!({ "status": "ok", "ts": timestamp })),
        )
            .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "health check could not reach the datastore");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(CACHE_CONTROL, "no-store")],
                Json(json!({ "status": "degraded", "ts": timestamp })),
            )
                .into_response()
        }
    }
}

async fn metrics(Extension(state): Extension<AppState>) -> Response {
    let body = metrics_body(&state);
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

pub fn metrics_body(state: &AppState) -> String {
    let counters = metrics_collector().snapshot();
    let http_metrics = metrics_collector().http_metrics_snapshot();

    let mut output = String::new();
    append_probe_metrics(&mut output, &counters);
    append_background_metrics(&mut output, &counters);
    append_sweep_metrics(&mut output, &counters);
    PROBE_BACKPRESSURE_METRICS.render(&mut output, state.backpressure.snapshot());
    append_http_request_metrics(&mut output, &http_metrics);
    output
}

fn append_probe_metrics(output: &mut String, counters: &RuntimeCountersSnapshot) {
    output.push_str("# HELP beacon_probes_total Classified probes by resulting status\n");
    output.push_str("# TYPE beacon_probes_total counter\n");
    for (status, total) in [
        ("up", counters.probes_up),
        ("slow", counters.probes_slow),
        ("down", counters.probes_down),
    ] {
        output.push_str(&format!(
            "beacon_probes_total{{status=\"{status}\"}} {total}\n"
        ));
    }
}

fn append_background_metrics(output: &mut String, counters: &RuntimeCountersSnapshot) {
    push_metric(
        output,
        "beacon_resurrections_total",
        "Dead services flipped back to a healthy status",
        "counter",
        counters.resurrections,
    );
    push_metric(
        output,
        "beacon_resurrection_failures_total",
        "Resurrection attempts that failed and were absorbed",
        "counter",
        counters.resurrection_failures,
    );
    push_metric(
        output,
        "beacon_notifications_delivered_total",
        "Transition batches accepted by the delivery collaborator",
        "counter",
        counters.notifications_delivered,
    );
    push_metric(
        output,
        "beacon_notification_failures_total",
        "Transition batches whose delivery failed and was discarded",
        "counter",
        counters.notification_failures,
    );
}

fn append_sweep_metrics(output: &mut String, counters: &RuntimeCountersSnapshot) {
    push_metric(
        output,
        "beacon_sweeps_total",
        "Completed retention sweeps",
        "counter",
        counters.sweeps,
    );
    push_metric(
        output,
        "beacon_sweep_failures_total",
        "Retention sweeps that failed at the datastore",
        "counter",
        counters.sweep_failures,
    );
    push_metric(
        output,
        "beacon_sweep_rows_deleted_total",
        "Status check rows removed by retention sweeps",
        "counter",
        counters.sweep_rows_deleted,
    );
}

fn append_http_request_metrics(output: &mut String, http_metrics: &HttpMetricsSnapshot) {
    output.push_str(
        "# HELP beacon_http_requests_total HTTP request outcomes by route and status code\n",
    );
    output.push_str("# TYPE beacon_http_requests_total counter\n");
    if http_metrics.requests.is_empty() {
        output.push_str("beacon_http_requests_total{route=\"none\",code=\"0\"} 0\n");
    } else {
        for entry in &http_metrics.requests {
            output.push_str(&format!(
                "beacon_http_requests_total{{route=\"{}\",code=\"{}\"}} {}\n",
                bounded_label(&entry.route),
                entry.status_code,
                entry.total
            ));
        }
    }

    if http_metrics.durations.is_empty() {
        return;
    }

    output.push_str("# HELP beacon_http_request_duration_seconds HTTP request latency\n");
    output.push_str("# TYPE beacon_http_request_duration_seconds histogram\n");
    for entry in &http_metrics.durations {
        let route = bounded_label(&entry.route);
        for (boundary, cumulative) in &entry.buckets {
            output.push_str(&format!(
                "beacon_http_request_duration_seconds_bucket{{route=\"{}\",le=\"{}\"}} {}\n",
                route, boundary, cumulative
            ));
        }
        output.push_str(&format!(
            "beacon_http_request_duration_seconds_bucket{{route=\"{}\",le=\"+Inf\"}} {}\n",
            route, entry.count
        ));
        output.push_str(&format!(
            "beacon_http_request_duration_seconds_sum{{route=\"{}\"}} {:.6}\n",
            route, entry.sum
        ));
        output.push_str(&format!(
            "beacon_http_request_duration_seconds_count{{route=\"{}\"}} {}\n",
            route, entry.count
        ));
    }
}

fn bounded_label(value: &str) -> String {
    const MAX_LEN: usize = 40;
    if value.len() <= MAX_LEN {
        value.to_string()
    } else {
        value.chars().take(MAX_LEN).collect()
    }
}

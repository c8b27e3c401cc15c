#![forbid(unsafe_code)]
use crate::app_state::AppState;
use crate::domain::CheckStatus;
use crate::error::{Context, Result};
use crate::evaluate::EvaluationError;
use crate::management;
use crate::metrics::metrics;
use crate::sweep::authorize;
use crate::uptime::UptimeSummary;
use axum::extract::rejection::PathRejection;
use axum::extract::{MatchedPath, Path, Request};
use axum::http::{
    header::{AUTHORIZATION, CACHE_CONTROL, RETRY_AFTER},
    HeaderMap, StatusCode,
};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value as JsonValue};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const HEALTHY_CACHE_CONTROL: &str = "public, s-maxage=60, stale-while-revalidate=30";
const DOWN_CACHE_CONTROL: &str = "public, s-maxage=30, stale-while-revalidate=15";
const NO_STORE: &str = "no-store";
const LIMIT_RETRY_AFTER_SECS: u64 = 1;

/// Full public router: evaluation, cron sweep, read API and management routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/check/", get(check_missing_domain))
        .route("/api/check/:domain", get(check_domain))
        .route(
            "/api/cron/cleanup",
            get(cron_cleanup).post(cron_cleanup),
        )
        .route("/api/v1/services/:slug", get(service_status))
        .merge(management::routes())
        .layer(middleware::from_fn(record_request))
        .layer(Extension(state))
}

pub async fn serve(addr: SocketAddr, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind http listener on {addr}"))?;
    let bound = listener.local_addr().unwrap_or(addr);
    info!(address = %bound, "http listener started");

    let server = axum::serve(listener, router(state)).with_graceful_shutdown(async move {
        shutdown.cancelled().await;
    });

    if let Err(err) = server.await {
        error!(address = %bound, %err, "http listener terminated with error");
        return Err(err.into());
    }

    info!(address = %bound, "http listener stopped");
    Ok(())
}

async fn record_request(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(request).await;
    metrics().record_http_request(&route, response.status().as_u16(), started.elapsed());
    response
}

async fn check_missing_domain() -> Response {
    invalid_domain("domain must not be empty")
}

async fn check_domain(
    Extension(state): Extension<AppState>,
    domain: Result<Path<String>, PathRejection>,
) -> Response {
    let domain = match domain {
        Ok(Path(domain)) => domain,
        Err(rejection) => return invalid_domain(&rejection.body_text()),
    };

    let Some(_permit) = state.backpressure.try_acquire_now() else {
        warn!(domain = %domain, "probe concurrency limit reached");
        return limit_response();
    };

    match state.evaluator.evaluate(&domain).await {
        Ok(evaluation) => {
            // Resurrection continues on its own; the response never waits for it.
            drop(evaluation.background);

            let cache_control = if evaluation.result.status == CheckStatus::Down {
                DOWN_CACHE_CONTROL
            } else {
                HEALTHY_CACHE_CONTROL
            };
            (
                StatusCode::OK,
                [(CACHE_CONTROL, cache_control)],
                Json(evaluation.result),
            )
                .into_response()
        }
        Err(EvaluationError::InvalidDomain(err)) => invalid_domain(&err.to_string()),
    }
}

async fn cron_cleanup(Extension(state): Extension<AppState>, headers: HeaderMap) -> Response {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if let Err(err) = authorize(header, state.cron_secret.as_deref()) {
        warn!(reason = %err, "rejected retention sweep request");
        return json_response(
            StatusCode::UNAUTHORIZED,
            NO_STORE,
            json!({ "error": "UNAUTHORIZED" }),
        );
    }

    match state.sweeper.sweep().await {
        Ok(report) => json_response(
            StatusCode::OK,
            NO_STORE,
            json!({
                "success": true,
                "deleted": report.deleted,
                "cutoff": report.cutoff,
            }),
        ),
        Err(err) => {
            error!(error = %err, "retention sweep failed");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                NO_STORE,
                json!({ "error": "SWEEP_FAILED" }),
            )
        }
    }
}

async fn service_status(Extension(state): Extension<AppState>, Path(slug): Path<String>) -> Response {
    let service = match state.store.service_by_slug(&slug).await {
        Ok(Some(service)) => service,
        Ok(None) => {
            return json_response(
                StatusCode::NOT_FOUND,
                NO_STORE,
                json!({ "error": "NOT_FOUND", "slug": slug }),
            )
        }
        Err(err) => return store_unavailable(&slug, &err.to_string()),
    };

    let now = Utc::now();
    let day_ago = now - ChronoDuration::hours(24);
    let checks = match state
        .store
        .checks_since(service.id, now - ChronoDuration::days(7))
        .await
    {
        Ok(checks) => checks,
        Err(err) => return store_unavailable(&slug, &err.to_string()),
    };

    let recent_start = checks.partition_point(|check| check.checked_at < day_ago);
    let last_24h = UptimeSummary::from_checks(&checks[recent_start..]);
    let last_7d = UptimeSummary::from_checks(&checks);

    json_response(
        StatusCode::OK,
        HEALTHY_CACHE_CONTROL,
        json!({
            "service": service,
            "uptime": {
                "last24h": last_24h,
                "last7d": last_7d,
            },
        }),
    )
}

fn invalid_domain(detail: &str) -> Response {
    json_response(
        StatusCode::BAD_REQUEST,
        NO_STORE,
        json!({ "error": "INVALID_DOMAIN", "detail": detail }),
    )
}

fn limit_response() -> Response {
    let mut response = json_response(
        StatusCode::TOO_MANY_REQUESTS,
        NO_STORE,
        json!({
            "error": "LIMITS_ENFORCED",
            "retry_after_seconds": LIMIT_RETRY_AFTER_SECS,
        }),
    );
    response
        .headers_mut()
        .insert(RETRY_AFTER, LIMIT_RETRY_AFTER_SECS.into());
    response
}

fn store_unavailable(slug: &str, detail: &str) -> Response {
    error!(slug = %slug, error = %detail, "service lookup failed");
    json_response(
        StatusCode::SERVICE_UNAVAILABLE,
        NO_STORE,
        json!({ "error": "STORE_UNAVAILABLE" }),
    )
}

fn json_response(status: StatusCode, cache_control: &'static str, body: JsonValue) -> Response {
    (status, [(CACHE_CONTROL, cache_control)], Json(body)).into_response()
}

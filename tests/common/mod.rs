#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use beacon::app_state::AppState;
use beacon::config::BeaconConfig;
use beacon::domain::{Domain, Service, ServiceStatus, StatusCheck, StatusTransition};
use beacon::error::Result;
use beacon::notify::NotificationSink;
use beacon::probe::{ProbeOutcome, Prober};
use beacon::store::{MemoryStore, StatusStore};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const CRON_SECRET: &str = "s3cret-token";

/// Prober double returning a fixed outcome and counting calls.
pub struct StubProber {
    outcome: ProbeOutcome,
    calls: AtomicUsize,
}

impl StubProber {
    pub fn new(outcome: ProbeOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn responding(status_code: u16, elapsed_ms: u64) -> Arc<Self> {
        Self::new(ProbeOutcome::Response {
            status_code,
            elapsed: Duration::from_millis(elapsed_ms),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for StubProber {
    async fn probe(&self, _domain: &Domain) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Sink forwarding every delivered batch onto a channel.
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<Vec<StatusTransition>>,
}

impl RecordingSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Vec<StatusTransition>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, transitions: &[StatusTransition]) -> Result<()> {
        let _ = self.tx.send(transitions.to_vec());
        Ok(())
    }
}

pub struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn deliver(&self, _transitions: &[StatusTransition]) -> Result<()> {
        Err(beacon::err!("webhook endpoint unavailable"))
    }
}

/// Sink whose delivery never completes.
pub struct StalledSink;

#[async_trait]
impl NotificationSink for StalledSink {
    async fn deliver(&self, _transitions: &[StatusTransition]) -> Result<()> {
        std::future::pending().await
    }
}

/// Store whose every call waits forever.
pub struct StalledStore;

#[async_trait]
impl StatusStore for StalledStore {
    async fn services_with_status(
        &self,
        _domain: &str,
        _status: ServiceStatus,
    ) -> Result<Vec<Service>> {
        std::future::pending().await
    }

    async fn update_cached_status(
        &self,
        _service_id: i64,
        _status: ServiceStatus,
        _response_time: u64,
        _checked_at: DateTime<Utc>,
    ) -> Result<()> {
        std::future::pending().await
    }

    async fn delete_checks_older_than(&self, _cutoff: DateTime<Utc>) -> Result<u64> {
        std::future::pending().await
    }

    async fn service_by_slug(&self, _slug: &str) -> Result<Option<Service>> {
        std::future::pending().await
    }

    async fn checks_since(
        &self,
        _service_id: i64,
        _since: DateTime<Utc>,
    ) -> Result<Vec<StatusCheck>> {
        std::future::pending().await
    }

    async fn ping(&self) -> Result<()> {
        std::future::pending().await
    }
}

pub fn service(id: i64, domain: &str, status: ServiceStatus) -> Service {
    Service {
        id,
        name: format!("Service {id}"),
        domain: domain.to_string(),
        slug: format!("service-{id}"),
        category: Some("infra".to_string()),
        status,
        response_time: None,
        last_checked: None,
    }
}

pub fn test_config() -> BeaconConfig {
    let mut config = BeaconConfig::default();
    config.probe.slow_threshold = Duration::from_millis(1000);
    config.retention.cron_secret = Some(CRON_SECRET.to_string());
    config
}

pub fn build_state(
    config: &BeaconConfig,
    store: &MemoryStore,
    prober: Arc<dyn Prober>,
    sink: Arc<dyn NotificationSink>,
) -> AppState {
    build_state_with_store(config, Arc::new(store.clone()), prober, sink)
}

pub fn build_state_with_store(
    config: &BeaconConfig,
    store: Arc<dyn StatusStore>,
    prober: Arc<dyn Prober>,
    sink: Arc<dyn NotificationSink>,
) -> AppState {
    AppState::assemble(config, store, prober, sink)
}

/// Local HTTP target answering `/` with `status` after `delay`.
pub async fn spawn_target(status: StatusCode, delay: Duration) -> SocketAddr {
    let app = Router::new().route(
        "/",
        get(move || async move {
            tokio::time::sleep(delay).await;
            (status, "ok")
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind target listener");
    let addr = listener.local_addr().expect("target address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Webhook endpoint answering with `status` and recording every JSON body it receives.
pub async fn spawn_webhook_receiver(
    status: StatusCode,
) -> (SocketAddr, Arc<Mutex<Vec<JsonValue>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let app = Router::new().route(
        "/hook",
        post(move |Json(body): Json<JsonValue>| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().expect("receiver lock").push(body);
                status
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind webhook listener");
    let addr = listener.local_addr().expect("webhook address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, received)
}

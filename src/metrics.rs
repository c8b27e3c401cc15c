use crate::backpressure::ControllerSnapshot;
use crate::domain::CheckStatus;
use crate::telemetry::{runtime_counters, RuntimeCounters};
use std::sync::OnceLock;
use std::time::Duration;

pub use crate::telemetry::{HttpDurationSnapshot, HttpMetricsSnapshot, RuntimeCountersSnapshot};

/// Collector that wraps the runtime counter APIs with a single entrypoint.
pub struct MetricsCollector {
    counters: &'static RuntimeCounters,
}

impl MetricsCollector {
    fn new() -> Self {
        Self {
            counters: runtime_counters(),
        }
    }

    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<MetricsCollector> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }

    pub fn snapshot(&self) -> RuntimeCountersSnapshot {
        self.counters.snapshot()
    }

    pub fn http_metrics_snapshot(&self) -> HttpMetricsSnapshot {
        self.counters.http_metrics_snapshot()
    }

    pub fn record_probe(&self, status: CheckStatus) {
        self.counters.record_probe(status);
    }

    pub fn inc_resurrections(&self) {
        self.counters.inc_resurrections();
    }

    pub fn inc_resurrection_failures(&self) {
        self.counters.inc_resurrection_failures();
    }

    pub fn inc_notifications_delivered(&self) {
        self.counters.inc_notifications_delivered();
    }

    pub fn inc_notification_failures(&self) {
        self.counters.inc_notification_failures();
    }

    pub fn record_sweep(&self, deleted: u64) {
        self.counters.record_sweep(deleted);
    }

    pub fn inc_sweep_failures(&self) {
        self.counters.inc_sweep_failures();
    }

    pub fn record_http_request(&self, route: &str, status: u16, duration: Duration) {
        self.counters.record_http_request(route, status, duration);
    }
}

/// Returns the shared `MetricsCollector` instance.
pub fn metrics() -> &'static MetricsCollector {
    MetricsCollector::global()
}

#[derive(Clone, Copy)]
pub struct BackpressureMetricSet {
    pub limit_metric: &'static str,
    pub limit_help: &'static str,
    pub inflight_metric: &'static str,
    pub inflight_help: &'static str,
    pub throttled_metric: &'static str,
    pub throttled_help: &'static str,
}

impl BackpressureMetricSet {
    pub fn render(&self, output: &mut String, snapshot: ControllerSnapshot) {
        push_metric(
            output,
            self.limit_metric,
            self.limit_help,
            "gauge",
            snapshot.limit.unwrap_or(0) as u64,
        );
        push_metric(
            output,
            self.inflight_metric,
            self.inflight_help,
            "gauge",
            snapshot.inflight,
        );
        push_metric(
            output,
            self.throttled_metric,
            self.throttled_help,
            "counter",
            snapshot.throttled,
        );
    }
}

pub const PROBE_BACKPRESSURE_METRICS: BackpressureMetricSet = BackpressureMetricSet {
    limit_metric: "beacon_backpressure_probe_max_concurrency",
    limit_help: "Configured concurrent probe permits (0 means unlimited)",
    inflight_metric: "beacon_backpressure_probe_inflight",
    inflight_help: "Probes currently in flight",
    throttled_metric: "beacon_backpressure_probe_throttled_total",
    throttled_help: "Evaluation requests rejected because no probe permit was free",
};

/// Appends a single unlabelled sample with its HELP/TYPE preamble.
pub fn push_metric(output: &mut String, name: &str, help: &str, kind: &str, value: u64) {
    output.push_str(&format!("# HELP {name} {help}\n"));
    output.push_str(&format!("# TYPE {name} {kind}\n"));
    output.push_str(&format!("{name} {value}\n"));
}

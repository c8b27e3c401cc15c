use crate::domain::CheckStatus;
use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self as stdfmt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::Event;
use tracing::Subscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::{
    self as fmt_subscriber, format::Writer, FmtContext, FormatEvent, FormatFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

const SERVICE_NAME: &str = "beacon";
const HTTP_DURATION_BUCKETS: [f64; 10] = [0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

pub fn init_tracing() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("beacon=info,info"));

    let stdout = std::io::stdout;
    let stderr = std::io::stderr;

    let writer = stdout
        .with_max_level(tracing::Level::INFO)
        .or_else(stderr.with_min_level(tracing::Level::WARN));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(false)
        .with_ansi(false)
        .event_format(KeyValueFormatter::new())
        .fmt_fields(fmt_subscriber::format::DefaultFields::new())
        .with_writer(writer)
        .try_init()
        .map_err(|err| crate::err!("failed to initialise tracing subscriber: {err}"))
}

pub struct KeyValueFormatter {
    service_name: &'static str,
}

impl KeyValueFormatter {
    pub const fn new() -> Self {
        Self {
            service_name: SERVICE_NAME,
        }
    }
}

impl Default for KeyValueFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, N> FormatEvent<S, N> for KeyValueFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let pid = std::process::id().to_string();
        let metadata = event.metadata();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());

        let mut fields = visitor.fields;
        fields.sort_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));

        let mut line = String::new();
        push_field(&mut line, "ts", &timestamp);
        push_field(&mut line, "level", metadata.level().as_str());
        push_field(&mut line, "service", self.service_name);
        push_field(&mut line, "component", metadata.target());
        push_field(&mut line, "pid", &pid);

        if let Some(span_path) = current_span_path(ctx) {
            push_field(&mut line, "span", &span_path);
        }

        push_field(&mut line, "msg", &message);

        for (key, value) in fields {
            push_field(&mut line, &key, &value);
        }

        if let Some(file) = metadata.file() {
            push_field(&mut line, "file", file);
        }
        if let Some(line_no) = metadata.line() {
            push_field(&mut line, "line", &line_no.to_string());
        }

        writer.write_str(&line)?;
        writer.write_char('\n')
    }
}

fn current_span_path<S, N>(ctx: &FmtContext<'_, S, N>) -> Option<String>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    let span = ctx.lookup_current()?;
    let names: Vec<&str> = span.scope().from_root().map(|s| s.name()).collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join("."))
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn record_field(&mut self, field: &Field, value: String) {
        if field.name().is_empty() {
            return;
        }
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_field(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        self.record_field(field, format!("{value:?}"));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_field(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_field(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_field(field, value.to_string());
    }
}

#[derive(Default)]
pub struct RuntimeCounters {
    probes_up: AtomicU64,
    probes_slow: AtomicU64,
    probes_down: AtomicU64,
    resurrections: AtomicU64,
    resurrection_failures: AtomicU64,
    notifications_delivered: AtomicU64,
    notification_failures: AtomicU64,
    sweeps: AtomicU64,
    sweep_failures: AtomicU64,
    sweep_rows_deleted: AtomicU64,
    http_requests: HttpRequestMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeCountersSnapshot {
    pub probes_up: u64,
    pub probes_slow: u64,
    pub probes_down: u64,
    pub resurrections: u64,
    pub resurrection_failures: u64,
    pub notifications_delivered: u64,
    pub notification_failures: u64,
    pub sweeps: u64,
    pub sweep_failures: u64,
    pub sweep_rows_deleted: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequestCountSnapshot {
    pub route: String,
    pub status_code: u16,
    pub total: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpDurationSnapshot {
    pub route: String,
    pub buckets: Vec<(f64, u64)>,
    pub sum: f64,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpMetricsSnapshot {
    pub requests: Vec<HttpRequestCountSnapshot>,
    pub durations: Vec<HttpDurationSnapshot>,
}

#[derive(Default)]
struct HttpRequestMetrics {
    counts: Mutex<BTreeMap<(String, u16), u64>>,
    durations: Mutex<HashMap<String, HttpDurationBuckets>>,
}

impl HttpRequestMetrics {
    fn record(&self, route: &str, status: u16, duration: Duration) {
        let mut counts = self
            .counts
            .lock()
            .expect("http request counts lock poisoned");
        *counts.entry((route.to_string(), status)).or_insert(0) += 1;
        drop(counts);

        let mut durations = self
            .durations
            .lock()
            .expect("http request durations lock poisoned");
        let entry = durations.entry(route.to_string()).or_default();
        entry.observe(duration.as_secs_f64());
    }

    fn snapshot(&self) -> HttpMetricsSnapshot {
        let counts_guard = self
            .counts
            .lock()
            .expect("http request counts lock poisoned");
        let durations_guard = self
            .durations
            .lock()
            .expect("http request durations lock poisoned");

        let requests = counts_guard
            .iter()
            .map(|((route, status), total)| HttpRequestCountSnapshot {
                route: route.clone(),
                status_code: *status,
                total: *total,
            })
            .collect();

        let mut durations: Vec<HttpDurationSnapshot> = durations_guard
            .iter()
            .map(|(route, buckets)| HttpDurationSnapshot {
                route: route.clone(),
                buckets: buckets.histogram(),
                sum: buckets.sum,
                count: buckets.total,
            })
            .collect();
        durations.sort_by(|lhs, rhs| lhs.route.cmp(&rhs.route));

        HttpMetricsSnapshot {
            requests,
            durations,
        }
    }
}

#[derive(Default)]
struct HttpDurationBuckets {
    counts: [u64; HTTP_DURATION_BUCKETS.len()],
    sum: f64,
    total: u64,
}

impl HttpDurationBuckets {
    fn observe(&mut self, duration_secs: f64) {
        if let Some(idx) = HTTP_DURATION_BUCKETS
            .iter()
            .position(|boundary| duration_secs <= *boundary)
        {
            self.counts[idx] += 1;
        }
        self.sum += duration_secs;
        self.total += 1;
    }

    fn histogram(&self) -> Vec<(f64, u64)> {
        let mut cumulative = 0;
        HTTP_DURATION_BUCKETS
            .iter()
            .enumerate()
            .map(|(idx, boundary)| {
                cumulative += self.counts[idx];
                (*boundary, cumulative)
            })
            .collect()
    }
}

static RUNTIME_COUNTERS: OnceLock<RuntimeCounters> = OnceLock::new();

pub fn runtime_counters() -> &'static RuntimeCounters {
    RUNTIME_COUNTERS.get_or_init(RuntimeCounters::default)
}

impl RuntimeCounters {
    pub fn record_probe(&self, status: CheckStatus) {
        let counter = match status {
            CheckStatus::Up => &self.probes_up,
            CheckStatus::Slow => &self.probes_slow,
            CheckStatus::Down => &self.probes_down,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_resurrections(&self) {
        self.resurrections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_resurrection_failures(&self) {
        self.resurrection_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notifications_delivered(&self) {
        self.notifications_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notification_failures(&self) {
        self.notification_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep(&self, deleted: u64) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.sweep_rows_deleted.fetch_add(deleted, Ordering::Relaxed);
    }

    pub fn inc_sweep_failures(&self) {
        self.sweep_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_request(&self, route: &str, status: u16, duration: Duration) {
        self.http_requests.record(route, status, duration);
    }

    pub fn http_metrics_snapshot(&self) -> HttpMetricsSnapshot {
        self.http_requests.snapshot()
    }

    pub fn snapshot(&self) -> RuntimeCountersSnapshot {
        RuntimeCountersSnapshot {
            probes_up: self.probes_up.load(Ordering::Relaxed),
            probes_slow: self.probes_slow.load(Ordering::Relaxed),
            probes_down: self.probes_down.load(Ordering::Relaxed),
            resurrections: self.resurrections.load(Ordering::Relaxed),
            resurrection_failures: self.resurrection_failures.load(Ordering::Relaxed),
            notifications_delivered: self.notifications_delivered.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            sweep_failures: self.sweep_failures.load(Ordering::Relaxed),
            sweep_rows_deleted: self.sweep_rows_deleted.load(Ordering::Relaxed),
        }
    }
}

fn encode_field_value(value: &str) -> String {
    let needs_quotes = value.chars().any(|c| {
        c.is_whitespace()
            || matches!(
                c,
                '"' | '\\' | '=' | '[' | ']' | '{' | '}' | ',' | '\n' | '\r' | '\t'
            )
    });

    if !needs_quotes {
        return value.to_string();
    }

    let mut encoded = String::with_capacity(value.len() + 2);
    encoded.push('"');
    for ch in value.chars() {
        match ch {
            '"' => encoded.push_str("\\\""),
            '\\' => encoded.push_str("\\\\"),
            '\n' => encoded.push_str("\\n"),
            '\r' => encoded.push_str("\\r"),
            '\t' => encoded.push_str("\\t"),
            _ => encoded.push(ch),
        }
    }
    encoded.push('"');
    encoded
}

fn push_field(buffer: &mut String, key: &str, value: &str) {
    if !buffer.is_empty() {
        buffer.push(' ');
    }
    buffer.push_str(key);
    buffer.push('=');
    buffer.push_str(&encode_field_value(value));
}

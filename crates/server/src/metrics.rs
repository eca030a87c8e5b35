//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the qform server:
//! - HTTP request metrics (latency, counts, auth failures)
//! - WebSocket connection metrics
//! - Item counts by status and run queue state (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use qform_core::ItemStatus;
use regex_lite::Regex;
use tracing::error;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "qform_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("qform_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "qform_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("qform_auth_failures_total", "Total authentication failures"),
        &["reason"],
    )
    .unwrap()
});

/// Requests refused because the client failed to log in too often.
pub static AUTH_RATE_LIMITED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "qform_auth_rate_limited_total",
        "Requests refused after repeated failed logins",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "qform_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "qform_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("qform_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "qform_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Item and Queue Metrics (collected dynamically)
// =============================================================================

/// Items by current status.
pub static ITEMS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("qform_items_by_status", "Current item count by status"),
        &["status"],
    )
    .unwrap()
});

/// Run queue worker state (1 = running, 0 = stopped).
pub static QUEUE_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "qform_queue_running",
        "Whether the processing queue is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Runs waiting behind the active one.
pub static RUNS_PENDING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("qform_runs_pending", "Number of queued processing runs").unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let server_metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // HTTP
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(AUTH_FAILURES_TOTAL.clone()),
        Box::new(AUTH_RATE_LIMITED_TOTAL.clone()),
        // WebSocket
        Box::new(WS_CONNECTIONS_ACTIVE.clone()),
        Box::new(WS_CONNECTIONS_TOTAL.clone()),
        Box::new(WS_MESSAGES_SENT.clone()),
        Box::new(WS_LAG_EVENTS.clone()),
        // Items and queue
        Box::new(ITEMS_BY_STATUS.clone()),
        Box::new(QUEUE_RUNNING.clone()),
        Box::new(RUNS_PENDING.clone()),
    ];

    // Core metrics (processing, remote service, uploads)
    for metric in server_metrics
        .into_iter()
        .chain(qform_core::metrics::all_metrics())
    {
        if let Err(e) = registry.register(metric) {
            error!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the registry and queue right now.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.queue().status().await;
    QUEUE_RUNNING.set(if status.running { 1 } else { 0 });
    RUNS_PENDING.set(status.pending_runs as i64);

    match state.registry().count_by_status() {
        Ok(counts) => {
            for item_status in ItemStatus::ALL {
                let count = counts.get(&item_status).copied().unwrap_or(0);
                ITEMS_BY_STATUS
                    .with_label_values(&[item_status.as_str()])
                    .set(count as i64);
            }
        }
        Err(e) => error!("Failed to count items by status: {}", e),
    }
}

static ITEM_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/items/[^/]+").unwrap());
static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Label for everything served by the static file fallback.
pub const STATIC_PATH_LABEL: &str = "/static";

/// Normalize a path for metric labels (replace IDs with placeholders).
///
/// `artifact_route` is the route segment artifact views are served under.
/// Any path that is not an API, metrics or artifact route is answered by the
/// static fallback and shares a single label.
pub fn normalize_path(path: &str, artifact_route: &str) -> String {
    if path.starts_with("/api/") || path == "/metrics" {
        let result = ITEM_SEGMENT.replace_all(path, "/items/{id}");
        let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
        return result.to_string();
    }

    let artifacts = format!("/{}/", artifact_route);
    if !artifact_route.is_empty() && path.starts_with(&artifacts) {
        return format!("{}{{key}}", artifacts);
    }

    STATIC_PATH_LABEL.to_string()
}

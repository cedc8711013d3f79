// crates/server/src/metrics.rs
//! Application metrics for Prometheus monitoring.
//!
//! This module provides:
//! - Prometheus metrics recorder initialization
//! - Metric definitions for upstream calls and optimistic reverts
//! - Helper functions for recording metrics

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at startup, before any metrics are recorded.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!(
        "upstream_requests_total",
        "Requests sent to Supabase, Notion, Google Calendar and proxied image hosts"
    );
    describe_histogram!(
        "upstream_request_duration_seconds",
        "Duration of upstream requests in seconds"
    );
    describe_counter!(
        "optimistic_reverts_total",
        "Local edits rolled back because the upstream write failed"
    );
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

/// Record a finished upstream request.
///
/// `status` is the HTTP status code, or `"error"` when no response arrived.
pub fn record_upstream(service: &str, status: &str, duration: Duration) {
    counter!("upstream_requests_total", "service" => service.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!("upstream_request_duration_seconds", "service" => service.to_string())
        .record(duration.as_secs_f64());
}

/// Record a rolled-back optimistic mutation (`kind` is e.g. `"media_update"`).
pub fn record_revert(kind: &str) {
    counter!("optimistic_reverts_total", "kind" => kind.to_string()).increment(1);
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `operation_invocations_total` (counter): intercepted invocations by operation, status
//! - `operation_duration_seconds` (histogram): latency of intercepted invocations
//! - `auth_decisions_total` (counter): guard outcomes (public, verified, rejected)

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_operation(operation: &str, status: &'static str, elapsed: Duration) {
    metrics::counter!(
        "operation_invocations_total",
        "operation" => operation.to_string(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!("operation_duration_seconds", "operation" => operation.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_auth_decision(outcome: &'static str) {
    metrics::counter!("auth_decisions_total", "outcome" => outcome).increment(1);
}

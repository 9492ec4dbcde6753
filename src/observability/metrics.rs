//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_calls_total` (counter): backend calls by action, outcome
//! - `gateway_call_duration_seconds` (histogram): backend call latency by action
//! - `gateway_http_requests_total` (counter): HTTP responses by route, status
//! - `gateway_history_fallback_total` (counter): history entries that could not be parsed

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_call(action: &'static str, outcome: &'static str, start: Instant) {
    counter!("gateway_calls_total", "action" => action, "outcome" => outcome).increment(1);
    histogram!("gateway_call_duration_seconds", "action" => action).record(start.elapsed().as_secs_f64());
}

pub fn record_http(route: String, status: u16) {
    counter!("gateway_http_requests_total", "route" => route, "status" => status.to_string()).increment(1);
}

pub fn record_history_fallback(count: usize) {
    if count > 0 {
        counter!("gateway_history_fallback_total").increment(count as u64);
    }
}

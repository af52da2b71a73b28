//! Metrics collection and exposition.
//!
//! # Metrics
//! - `starter_upstream_requests_total` (counter): outbound calls by target, outcome
//! - `starter_upstream_retries_total` (counter): retries by target
//! - `starter_cache_events_total` (counter): hit, miss, eviction
//! - `starter_circuit_open` (gauge): 1=open, 0=closed, per target
//! - `starter_pipeline_total` (counter): start requests by terminal state
//! - `starter_pipeline_duration_seconds` (histogram): whole-pipeline latency
//! - `starter_refused_requests_total` (counter): unauthorized or rate limited
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_upstream_request(target: &str, outcome: &'static str) {
    counter!(
        "starter_upstream_requests_total",
        "target" => target.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_retry(target: &str) {
    counter!("starter_upstream_retries_total", "target" => target.to_string()).increment(1);
}

pub fn record_cache_event(event: &'static str) {
    counter!("starter_cache_events_total", "event" => event).increment(1);
}

pub fn record_circuit_state(target: &str, open: bool) {
    gauge!("starter_circuit_open", "target" => target.to_string()).set(if open { 1.0 } else { 0.0 });
}

pub fn record_pipeline(state: &'static str, start: Instant) {
    counter!("starter_pipeline_total", "state" => state).increment(1);
    histogram!("starter_pipeline_duration_seconds", "state" => state)
        .record(start.elapsed().as_secs_f64());
}

/// Inbound request refused before reaching a handler.
pub fn record_refused_request(reason: &'static str) {
    counter!("starter_refused_requests_total", "reason" => reason).increment(1);
}

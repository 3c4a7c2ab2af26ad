//! Metrics collection and exposition.
//!
//! # Metrics
//! - `command_executions_total` (counter): settled commands by name, outcome
//! - `command_rejections_total` (counter): admission refusals by name, reason
//! - `command_duration_seconds` (histogram): body latency by name
//! - `circuit_breaker_transitions_total` (counter): by breaker, state
//! - `commands_in_flight` (gauge): executions currently holding a slot
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op
//! - Labels are command names, never command payloads

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus metrics exporter"),
    }
}

pub fn record_command(name: &str, outcome: &'static str, elapsed: Duration) {
    metrics::counter!(
        "command_executions_total",
        "command" => name.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("command_duration_seconds", "command" => name.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_rejection(name: &str, reason: &'static str) {
    metrics::counter!(
        "command_rejections_total",
        "command" => name.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_breaker_transition(key: &str, open: bool) {
    let state = if open { "open" } else { "closed" };
    metrics::counter!(
        "circuit_breaker_transitions_total",
        "breaker" => key.to_string(),
        "state" => state
    )
    .increment(1);
}

pub fn set_in_flight(count: usize) {
    metrics::gauge!("commands_in_flight").set(count as f64);
}

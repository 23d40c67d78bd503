//! Metrics collection and exposition.
//!
//! # Metrics
//! - `chain_rpc_requests_total` (counter): RPC requests by method and outcome
//! - `chain_transactions_submitted_total` (counter): raw transactions accepted by the node
//! - `chain_events_delivered_total` (counter): watched events handed to callbacks, by event
//!
//! Without an installed recorder every call is a no-op.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one RPC round-trip.
pub fn record_rpc_request(method: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!("chain_rpc_requests_total", "method" => method, "outcome" => outcome)
        .increment(1);
}

/// Record a transaction accepted by the node.
pub fn record_transaction_submitted() {
    metrics::counter!("chain_transactions_submitted_total").increment(1);
}

/// Record an event delivered to a watch callback.
pub fn record_event_delivered(event: &str) {
    metrics::counter!("chain_events_delivered_total", "event" => event.to_string()).increment(1);
}

//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define endpoint metrics (connections, handshake failures, logged chains)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `cert_echo_connections_accepted_total` (counter): TCP connections accepted
//! - `cert_echo_handshakes_failed_total` (counter): handshakes that failed or timed out
//! - `cert_echo_chains_logged_total` (counter): chain lines written
//! - `cert_echo_active_connections` (gauge): connections currently open
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Recording is a no-op until a recorder is installed

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_connection_accepted() {
    ::metrics::counter!("cert_echo_connections_accepted_total").increment(1);
    ::metrics::gauge!("cert_echo_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    ::metrics::gauge!("cert_echo_active_connections").decrement(1.0);
}

/// `reason` is `"error"` or `"timeout"`.
pub fn record_handshake_failed(reason: &'static str) {
    ::metrics::counter!("cert_echo_handshakes_failed_total", "reason" => reason).increment(1);
}

pub fn record_chain_logged() {
    ::metrics::counter!("cert_echo_chains_logged_total").increment(1);
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `conn_recycler_transitions_total` (counter): state changes by host, from, to
//! - `conn_recycler_forced_closes_total` (counter): requests flagged to close by host
//! - `conn_recycler_dropped_samples_total` (counter): observations skipped by reason
//! - `conn_recycler_hosts_tracked` (gauge): hosts with a latency machine
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; a no-op until a recorder is installed
//! - Prometheus exporter is opt-in via configuration

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::latency::State;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_transition(host: &str, from: State, to: State) {
    metrics::counter!(
        "conn_recycler_transitions_total",
        "host" => host.to_owned(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

pub fn record_forced_close(host: &str) {
    metrics::counter!("conn_recycler_forced_closes_total", "host" => host.to_owned()).increment(1);
}

pub fn record_dropped_sample(reason: &'static str) {
    metrics::counter!("conn_recycler_dropped_samples_total", "reason" => reason).increment(1);
}

pub fn record_hosts_tracked(count: usize) {
    metrics::gauge!("conn_recycler_hosts_tracked").set(count as f64);
}

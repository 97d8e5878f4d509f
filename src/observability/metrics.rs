//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `cache_lookups_total` (counter): response cache hits and misses
//! - `dependency_up` (gauge): 1=healthy, 0=unhealthy, per dependency
//!
//! Without an installed exporter every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("http_requests_total", "method" => method.to_string(), "status" => status.clone())
        .increment(1);
    histogram!("http_request_duration_seconds", "method" => method.to_string(), "status" => status)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("cache_lookups_total", "result" => result).increment(1);
}

pub fn record_dependency_health(name: &'static str, healthy: bool) {
    gauge!("dependency_up", "dependency" => name).set(if healthy { 1.0 } else { 0.0 });
}

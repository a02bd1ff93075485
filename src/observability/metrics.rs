//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): proxied requests by method, status
//! - `proxy_request_duration_seconds` (histogram): time to response headers
//! - `proxy_upstream_retries_total` (counter): retried attempts by method
//! - `proxy_backend_updates_total` (counter): control-plane updates by outcome

use std::net::SocketAddr;
use std::time::Instant;
use axum::http::{Method, StatusCode};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &Method, status: StatusCode, started: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.as_u16().to_string()),
    ];
    ::metrics::counter!("proxy_requests_total", &labels).increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds", &labels)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_retry(method: &Method) {
    ::metrics::counter!("proxy_upstream_retries_total", "method" => method.to_string()).increment(1);
}

pub fn record_backend_update(outcome: &'static str) {
    ::metrics::counter!("proxy_backend_updates_total", "outcome" => outcome).increment(1);
}

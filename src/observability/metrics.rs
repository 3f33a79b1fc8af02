//! Metrics collection and exposition.
//!
//! # Metrics
//! - `scan_requests_total` (counter): requests by route and status
//! - `scan_request_duration_seconds` (histogram): latency by route
//! - `scan_rate_limited_total` (counter): requests rejected with 429
//! - `scan_rate_limiter_degraded_total` (counter): requests admitted because the counter store failed
//! - `scan_analysis_total` (counter): pipeline results by outcome
//! - `scan_logins_total` (counter): external logins by result
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    counter!(
        "scan_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("scan_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("scan_rate_limited_total").increment(1);
}

pub fn record_rate_limiter_degraded() {
    counter!("scan_rate_limiter_degraded_total").increment(1);
}

pub fn record_analysis(outcome: &'static str) {
    counter!("scan_analysis_total", "outcome" => outcome).increment(1);
}

pub fn record_login(result: &'static str) {
    counter!("scan_logins_total", "result" => result).increment(1);
}

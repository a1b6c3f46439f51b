//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, upstream
//! - `gateway_request_duration_seconds` (histogram): latency by upstream
//! - `gateway_rate_limited_total` (counter): rejected by the rate limiter
//! - `gateway_rate_budgets` (gauge): live client budgets after a sweep
//! - `otp_issued_total` / `otp_verifications_total` (counters)
//! - `attachment_scans_total` / `attachment_scan_completions_total` (counters)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, upstream: &str, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "upstream" => upstream.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "upstream" => upstream.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    metrics::counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_budget_count(count: usize) {
    metrics::gauge!("gateway_rate_budgets").set(count as f64);
}

pub fn record_otp_issued() {
    metrics::counter!("otp_issued_total").increment(1);
}

pub fn record_otp_verification(outcome: &'static str) {
    metrics::counter!("otp_verifications_total", "outcome" => outcome).increment(1);
}

pub fn record_scan(kind: &'static str, status: &'static str) {
    metrics::counter!("attachment_scans_total", "kind" => kind, "status" => status).increment(1);
}

pub fn record_scan_completion(status: &'static str) {
    metrics::counter!("attachment_scan_completions_total", "status" => status).increment(1);
}

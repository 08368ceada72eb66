//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mcp_http_requests_total` (counter): requests by route, status
//! - `mcp_http_request_duration_seconds` (histogram): latency by route
//! - `mcp_rate_limited_total` (counter): requests refused by the rate limiter
//! - `mcp_auth_rejections_total` (counter): authorization failures by reason
//! - `mcp_sessions_created_total` / `mcp_sessions_reaped_total` (counters)
//! - `mcp_sessions_active` (gauge): live sessions
//! - `mcp_reply_timeouts_total` (counter): calls answered with 408

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    counter!("mcp_http_requests_total", "route" => route.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!("mcp_http_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("mcp_rate_limited_total").increment(1);
}

pub fn record_auth_rejection(reason: &'static str) {
    counter!("mcp_auth_rejections_total", "reason" => reason).increment(1);
}

pub fn record_session_created(active: usize) {
    counter!("mcp_sessions_created_total").increment(1);
    set_active_sessions(active);
}

pub fn record_sessions_reaped(reaped: usize, active: usize) {
    counter!("mcp_sessions_reaped_total").increment(reaped as u64);
    set_active_sessions(active);
}

pub fn set_active_sessions(active: usize) {
    gauge!("mcp_sessions_active").set(active as f64);
}

pub fn record_reply_timeout() {
    counter!("mcp_reply_timeouts_total").increment(1);
}

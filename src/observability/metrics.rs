//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_provider_attempts_total` (counter): attempts by provider and outcome
//! - `proxy_resolve_total` (counter): resolutions by result (resolved/exhausted)
//! - `proxy_breaker_open` (gauge): 1=open, 0=closed, per provider
//! - `proxy_event_subscribers` (gauge): current stream subscribers
//! - `monitor_poll_total` (counter): health polls by result
//! - `monitor_stream_reconnects_total` (counter): stream disconnects

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Install the exporter if enabled and the address parses.
pub fn init_from_config(enabled: bool, address: &str) {
    if !enabled {
        return;
    }
    match address.parse() {
        Ok(addr) => init_metrics(addr),
        Err(_) => tracing::error!(metrics_address = %address, "Failed to parse metrics address"),
    }
}

pub fn record_provider_attempt(provider: &str, outcome: &'static str) {
    metrics::counter!(
        "proxy_provider_attempts_total",
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_resolve(result: &'static str) {
    metrics::counter!("proxy_resolve_total", "result" => result).increment(1);
}

pub fn record_breaker_open(provider: &str, open: bool) {
    metrics::gauge!("proxy_breaker_open", "provider" => provider.to_string())
        .set(if open { 1.0 } else { 0.0 });
}

pub fn record_subscribers(count: usize) {
    metrics::gauge!("proxy_event_subscribers").set(count as f64);
}

pub fn record_poll(result: &'static str) {
    metrics::counter!("monitor_poll_total", "result" => result).increment(1);
}

pub fn record_stream_reconnect() {
    metrics::counter!("monitor_stream_reconnects_total").increment(1);
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `site_requests_rejected_total` (counter): guard rejections by reason
//! - `site_rate_limited_total` (counter): 429s by route
//! - `site_csrf_tokens_issued_total` (counter): successful token mints
//! - `site_payment_sessions_total` (counter): session attempts by outcome
//! - `site_emails_total` (counter): approval emails by outcome
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rejection(reason: &'static str) {
    counter!("site_requests_rejected_total", "reason" => reason).increment(1);
}

pub fn record_rate_limited(route: &str) {
    counter!("site_rate_limited_total", "route" => route.to_string()).increment(1);
}

pub fn record_token_issued() {
    counter!("site_csrf_tokens_issued_total").increment(1);
}

pub fn record_payment_session(outcome: &str) {
    counter!("site_payment_sessions_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_email(outcome: &'static str) {
    counter!("site_emails_total", "outcome" => outcome).increment(1);
}

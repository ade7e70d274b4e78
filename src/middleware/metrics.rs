//! Prometheus metrics for the notification service.
//!
//! Exposes a standard `/metrics` endpoint that Prometheus can scrape.
//! Everything is registered once in the global default registry.

use once_cell::sync::Lazy;
use prometheus::{
    opts, register_int_counter_vec, register_int_gauge, Encoder, IntCounterVec, IntGauge,
    TextEncoder,
};

pub struct InboxMetrics {
    /// Push attempts per event and per outcome (delivered / dropped / offline).
    pushes_total: IntCounterVec,
    /// Unread -> Read transitions, labelled by trigger (single / chat).
    read_transitions_total: IntCounterVec,
    fanout_failures_total: IntCounterVec,
    store_errors_total: IntCounterVec,
    live_connections: IntGauge,
}

static METRICS: Lazy<InboxMetrics> = Lazy::new(|| InboxMetrics {
    pushes_total: register_int_counter_vec!(
        opts!("inbox_pushes_total", "Live-channel push attempts"),
        &["event", "outcome"]
    )
    .expect("failed to register inbox_pushes_total"),
    read_transitions_total: register_int_counter_vec!(
        opts!(
            "inbox_read_transitions_total",
            "Notifications moved from unread to read"
        ),
        &["trigger"]
    )
    .expect("failed to register inbox_read_transitions_total"),
    fanout_failures_total: register_int_counter_vec!(
        opts!(
            "inbox_fanout_failures_total",
            "Fan-out attempts that failed after a committed change"
        ),
        &["stage"]
    )
    .expect("failed to register inbox_fanout_failures_total"),
    store_errors_total: register_int_counter_vec!(
        opts!("inbox_store_errors_total", "Storage errors surfaced to callers"),
        &["kind"]
    )
    .expect("failed to register inbox_store_errors_total"),
    live_connections: register_int_gauge!(opts!(
        "inbox_live_connections",
        "Open live-channel connections"
    ))
    .expect("failed to register inbox_live_connections"),
});

pub fn record_push(event: &str, outcome: &str) {
    METRICS
        .pushes_total
        .with_label_values(&[event, outcome])
        .inc();
}

pub fn record_read_transitions(trigger: &str, count: u64) {
    if count > 0 {
        METRICS
            .read_transitions_total
            .with_label_values(&[trigger])
            .inc_by(count);
    }
}

pub fn record_fanout_failure(stage: &str) {
    METRICS
        .fanout_failures_total
        .with_label_values(&[stage])
        .inc();
}

pub fn record_store_error() {
    METRICS.store_errors_total.with_label_values(&["request"]).inc();
}

pub fn connection_opened() {
    METRICS.live_connections.inc();
}

pub fn connection_closed() {
    METRICS.live_connections.dec();
}

/// Encode all registered metrics as Prometheus text format.
/// Called by the `/metrics` HTTP handler.
pub fn encode_metrics() -> String {
    Lazy::force(&METRICS);
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_returns_valid_text() {
        let output = encode_metrics();
        assert!(output.is_ascii() || output.is_empty());
    }

    #[test]
    fn test_recorded_push_shows_up() {
        record_push("UnreadCountChanged", "delivered");
        let output = encode_metrics();
        assert!(output.contains("inbox_pushes_total"));
        assert!(output.contains("outcome=\"delivered\""));
    }
}

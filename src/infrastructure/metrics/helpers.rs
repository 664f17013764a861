//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    BROADCASTS_TOTAL, BROADCAST_FANOUT, CONNECTIONS_ACTIVE, DELIVERIES_TOTAL,
    DELIVERY_FAILURES_TOTAL, DIRECT_SENDS_TOTAL, HEARTBEAT_DURATION_MS,
    HEARTBEAT_EVICTIONS_TOTAL, ITEM_OPERATIONS_TOTAL, WS_CONNECTIONS_CLOSED,
    WS_CONNECTIONS_OPENED, WS_CONNECTIONS_REJECTED, WS_CONNECTION_DURATION,
    WS_MESSAGES_RECEIVED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for connection lifecycle metrics
pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn record_opened() {
        WS_CONNECTIONS_OPENED.inc();
        CONNECTIONS_ACTIVE.inc();
    }

    pub fn record_closed() {
        WS_CONNECTIONS_CLOSED.inc();
        CONNECTIONS_ACTIVE.dec();
    }

    pub fn record_rejected(reason: &str) {
        WS_CONNECTIONS_REJECTED.with_label_values(&[reason]).inc();
    }

    pub fn record_duration(duration_secs: f64) {
        WS_CONNECTION_DURATION.observe(duration_secs);
    }
}

/// Helper struct for recording inbound WebSocket frame metrics
pub struct WsMessageMetrics;

impl WsMessageMetrics {
    pub fn record_text() {
        WS_MESSAGES_RECEIVED.with_label_values(&["text"]).inc();
    }

    pub fn record_binary() {
        WS_MESSAGES_RECEIVED.with_label_values(&["binary"]).inc();
    }

    pub fn record_ping() {
        WS_MESSAGES_RECEIVED.with_label_values(&["ping"]).inc();
    }

    pub fn record_pong() {
        WS_MESSAGES_RECEIVED.with_label_values(&["pong"]).inc();
    }

    pub fn record_close() {
        WS_MESSAGES_RECEIVED.with_label_values(&["close"]).inc();
    }
}

/// Helper struct for broadcast and delivery metrics
pub struct ChatMetrics;

impl ChatMetrics {
    /// Record a broadcast of the given message kind with its fanout size
    pub fn record_broadcast(kind: &str, recipients: usize) {
        BROADCASTS_TOTAL.with_label_values(&[kind]).inc();
        BROADCAST_FANOUT.observe(recipients as f64);
    }

    pub fn record_direct() {
        DIRECT_SENDS_TOTAL.inc();
    }

    pub fn record_delivered(count: u64) {
        DELIVERIES_TOTAL.inc_by(count);
    }

    pub fn record_failed(reason: &str) {
        DELIVERY_FAILURES_TOTAL.with_label_values(&[reason]).inc();
    }
}

/// Helper struct for heartbeat metrics
pub struct HeartbeatMetrics;

impl HeartbeatMetrics {
    pub fn record_duration_ms(duration_ms: u64) {
        HEARTBEAT_DURATION_MS.observe(duration_ms as f64);
    }

    pub fn record_evictions(count: u64) {
        HEARTBEAT_EVICTIONS_TOTAL.inc_by(count);
    }
}

/// Helper struct for item API metrics
pub struct ItemMetrics;

impl ItemMetrics {
    pub fn record(operation: &str, outcome: &str) {
        ITEM_OPERATIONS_TOTAL
            .with_label_values(&[operation, outcome])
            .inc();
    }
}

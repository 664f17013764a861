//! Prometheus metrics for the service.
//!
//! - Connection metrics (active, opened, closed, rejected, lifetime)
//! - Chat metrics (inbound frames, broadcasts, deliveries, failures)
//! - Heartbeat metrics (sweep duration, evictions)
//! - Item API metrics (operations by outcome)

mod helpers;

pub use helpers::{
    encode_metrics, ChatMetrics, ConnectionMetrics, HeartbeatMetrics, ItemMetrics,
    WsMessageMetrics,
};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "mumo";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Number of currently registered WebSocket connections
    pub static ref CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_ws_connections_active", METRIC_PREFIX),
        "Number of currently registered WebSocket connections"
    ).unwrap();

    /// WebSocket connections opened
    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections accepted into the registry"
    ).unwrap();

    /// WebSocket connections closed
    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections removed from the registry"
    ).unwrap();

    /// WebSocket connections refused at accept or handshake
    pub static ref WS_CONNECTIONS_REJECTED: IntCounterVec = register_int_counter_vec!(
        format!("{}_ws_connections_rejected_total", METRIC_PREFIX),
        "Total WebSocket connections refused",
        &["reason"]
    ).unwrap();

    /// WebSocket connection duration
    pub static ref WS_CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_ws_connection_duration_seconds", METRIC_PREFIX),
        "WebSocket connection duration in seconds",
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0]
    ).unwrap();

    // ============================================================================
    // Chat Metrics
    // ============================================================================

    /// WebSocket frames received from clients
    pub static ref WS_MESSAGES_RECEIVED: IntCounterVec = register_int_counter_vec!(
        format!("{}_ws_messages_received_total", METRIC_PREFIX),
        "Total WebSocket frames received from clients",
        &["type"]
    ).unwrap();

    /// Broadcasts by message kind
    pub static ref BROADCASTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_broadcasts_total", METRIC_PREFIX),
        "Total broadcast operations",
        &["kind"]
    ).unwrap();

    /// Direct (single connection) sends
    pub static ref DIRECT_SENDS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_direct_sends_total", METRIC_PREFIX),
        "Total direct messages sent to a single connection"
    ).unwrap();

    /// Successful per-connection deliveries
    pub static ref DELIVERIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Total messages handed to a connection's outbound queue"
    ).unwrap();

    /// Failed per-connection deliveries
    pub static ref DELIVERY_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_delivery_failures_total", METRIC_PREFIX),
        "Total per-connection delivery failures",
        &["reason"]
    ).unwrap();

    /// Recipients per broadcast
    pub static ref BROADCAST_FANOUT: Histogram = register_histogram!(
        format!("{}_broadcast_fanout", METRIC_PREFIX),
        "Number of recipients per broadcast",
        vec![0.0, 1.0, 2.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0]
    ).unwrap();

    // ============================================================================
    // Heartbeat Metrics
    // ============================================================================

    /// Heartbeat sweep duration
    pub static ref HEARTBEAT_DURATION_MS: Histogram = register_histogram!(
        format!("{}_heartbeat_duration_ms", METRIC_PREFIX),
        "Time spent enqueuing heartbeats to all connections",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0]
    ).unwrap();

    /// Connections evicted for inactivity
    pub static ref HEARTBEAT_EVICTIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_heartbeat_evictions_total", METRIC_PREFIX),
        "Total connections evicted for inactivity"
    ).unwrap();

    // ============================================================================
    // Item API Metrics
    // ============================================================================

    /// Item operations by kind and outcome
    pub static ref ITEM_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_item_operations_total", METRIC_PREFIX),
        "Total item operations",
        &["operation", "outcome"]
    ).unwrap();
}

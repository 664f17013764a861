use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;

use crate::connection_manager::{ConnectionHandle, ConnectionRegistry, DeliveryError};
use crate::metrics::ChatMetrics;
use crate::websocket::OutboundMessage;

use super::ChatMessage;

/// Maximum number of concurrent message sends
const MAX_CONCURRENT_SENDS: usize = 100;

/// Fanouts at or below this size are sent sequentially
const SEQUENTIAL_FANOUT_LIMIT: usize = 3;

/// Outcome of a single broadcast
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryReport {
    /// Members of the snapshot the broadcast was sent to
    pub recipients: usize,
    /// Connections the message was enqueued for
    pub delivered: usize,
    /// Per-connection failures; each failed connection was removed
    #[serde(skip)]
    pub failures: Vec<DeliveryError>,
}

impl DeliveryReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Statistics for the broadcaster
#[derive(Debug, Default)]
pub struct BroadcastStats {
    pub broadcasts: AtomicU64,
    pub direct_sends: AtomicU64,
    pub total_delivered: AtomicU64,
    pub total_failed: AtomicU64,
}

impl BroadcastStats {
    pub fn snapshot(&self) -> BroadcastStatsSnapshot {
        BroadcastStatsSnapshot {
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            direct_sends: self.direct_sends.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of broadcaster statistics
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastStatsSnapshot {
    pub broadcasts: u64,
    pub direct_sends: u64,
    pub total_delivered: u64,
    pub total_failed: u64,
}

/// Fans chat messages out to every registered connection
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    stats: BroadcastStats,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            stats: BroadcastStats::default(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get broadcaster statistics
    pub fn stats(&self) -> BroadcastStatsSnapshot {
        self.stats.snapshot()
    }

    /// Deliver a message to every connection registered at call time.
    ///
    /// A failed send affects only its target: the failure is recorded in the
    /// report and the target is removed from the registry.
    #[tracing::instrument(
        name = "broadcaster.broadcast",
        skip(self, message),
        fields(kind = message.kind())
    )]
    pub async fn broadcast(&self, message: &ChatMessage) -> DeliveryReport {
        let connections = self.registry.snapshot();
        let outbound = OutboundMessage::text(message.to_string());

        let (delivered, failures) = self.send_to_connections(&connections, &outbound).await;

        for failure in &failures {
            tracing::warn!(
                connection_id = %failure.connection_id(),
                error = %failure,
                "Delivery failed, dropping connection"
            );
            ChatMetrics::record_failed(failure.reason());
            self.registry.remove(failure.connection_id());
        }

        // Update stats
        self.stats.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.stats.total_delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        self.stats.total_failed.fetch_add(failures.len() as u64, Ordering::Relaxed);

        ChatMetrics::record_broadcast(message.kind(), connections.len());
        ChatMetrics::record_delivered(delivered as u64);

        tracing::debug!(
            recipients = connections.len(),
            delivered = delivered,
            failed = failures.len(),
            "Broadcast message to all connections"
        );

        DeliveryReport {
            recipients: connections.len(),
            delivered,
            failures,
        }
    }

    /// Deliver a message to exactly one connection
    pub async fn send_direct(
        &self,
        connection: &ConnectionHandle,
        message: &ChatMessage,
    ) -> Result<(), DeliveryError> {
        self.stats.direct_sends.fetch_add(1, Ordering::Relaxed);
        ChatMetrics::record_direct();

        match connection.send(OutboundMessage::text(message.to_string())).await {
            Ok(()) => {
                self.stats.total_delivered.fetch_add(1, Ordering::Relaxed);
                ChatMetrics::record_delivered(1);
                Ok(())
            }
            Err(e) => {
                self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
                ChatMetrics::record_failed(e.reason());
                tracing::debug!(
                    connection_id = %connection.id,
                    error = %e,
                    "Direct send failed"
                );
                Err(e)
            }
        }
    }

    /// Send one message to a list of connections.
    /// Small lists go sequentially; larger ones with bounded parallelism.
    async fn send_to_connections(
        &self,
        connections: &[Arc<ConnectionHandle>],
        message: &OutboundMessage,
    ) -> (usize, Vec<DeliveryError>) {
        let mut delivered = 0;
        let mut failures = Vec::new();

        if connections.len() <= SEQUENTIAL_FANOUT_LIMIT {
            for conn in connections {
                match conn.send(message.clone()).await {
                    Ok(()) => delivered += 1,
                    Err(e) => failures.push(e),
                }
            }
            return (delivered, failures);
        }

        let mut futures = FuturesUnordered::new();
        let mut pending = 0;

        for conn in connections {
            let conn = conn.clone();
            let msg = message.clone();
            futures.push(async move { conn.send(msg).await });
            pending += 1;

            // Process completed futures when we hit the concurrency limit
            while pending >= MAX_CONCURRENT_SENDS {
                let Some(result) = futures.next().await else {
                    break;
                };
                pending -= 1;
                match result {
                    Ok(()) => delivered += 1,
                    Err(e) => failures.push(e),
                }
            }
        }

        // Process remaining futures
        while let Some(result) = futures.next().await {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => failures.push(e),
            }
        }

        (delivered, failures)
    }
}

//! Graceful shutdown of the chat channel.
//!
//! Stops background tasks, tells connected clients the server is going away,
//! then closes every live connection so each session ends on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use crate::broadcast::{Broadcaster, ChatMessage};
use crate::connection_manager::ConnectionRegistry;

const SHUTDOWN_NOTICE: &str = "Server is shutting down";

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Upper bound for delivering the shutdown notice (default: 5 seconds)
    pub client_notification_timeout: Duration,
    /// Grace period for writer tasks to flush before connections are closed
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            client_notification_timeout: Duration::from_secs(5),
            drain_timeout: Duration::from_millis(200),
        }
    }
}

/// Handles graceful shutdown of the service
pub struct GracefulShutdown {
    registry: Arc<ConnectionRegistry>,
    broadcaster: Arc<Broadcaster>,
    shutdown_tx: broadcast::Sender<()>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        broadcaster: Arc<Broadcaster>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self::with_config(registry, broadcaster, shutdown_tx, ShutdownConfig::default())
    }

    pub fn with_config(
        registry: Arc<ConnectionRegistry>,
        broadcaster: Arc<Broadcaster>,
        shutdown_tx: broadcast::Sender<()>,
        config: ShutdownConfig,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            shutdown_tx,
            config,
        }
    }

    /// Execute graceful shutdown sequence
    #[tracing::instrument(
        name = "graceful_shutdown",
        skip(self),
        fields(total_connections = self.registry.len())
    )]
    pub async fn execute(&self, reason: &str) -> ShutdownResult {
        let start = std::time::Instant::now();
        let mut result = ShutdownResult::default();

        tracing::info!(reason = %reason, "Starting graceful shutdown - Phase 1: Signaling background tasks");
        let _ = self.shutdown_tx.send(());

        tracing::info!("Phase 2: Notifying clients");
        result.clients_notified = self.notify_clients().await;

        tracing::info!("Phase 3: Closing connections");
        if result.clients_notified > 0 {
            tokio::time::sleep(self.config.drain_timeout).await;
        }
        result.connections_closed = self.registry.close_all();

        result.duration = start.elapsed();

        tracing::info!(
            clients_notified = result.clients_notified,
            connections_closed = result.connections_closed,
            duration_ms = result.duration.as_millis(),
            "Graceful shutdown completed"
        );

        result
    }

    async fn notify_clients(&self) -> usize {
        if self.registry.is_empty() {
            return 0;
        }

        let notice = ChatMessage::notice(SHUTDOWN_NOTICE);
        match timeout(
            self.config.client_notification_timeout,
            self.broadcaster.broadcast(&notice),
        )
        .await
        {
            Ok(report) => report.delivered,
            Err(_) => {
                tracing::warn!("Timeout sending shutdown notifications");
                0
            }
        }
    }
}

/// Result of a graceful shutdown operation
#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Number of clients the shutdown notice was queued for
    pub clients_notified: usize,
    /// Number of connections closed by the shutdown
    pub connections_closed: usize,
    /// Total time taken for shutdown
    pub duration: Duration,
}

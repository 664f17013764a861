//! Connection handle and related types

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::WebSocketConfig;
use crate::websocket::OutboundMessage;

/// Handle for a single live WebSocket connection.
///
/// The socket itself is owned by the connection's writer task; everything
/// else reaches it through the bounded outbound queue held here.
pub struct ConnectionHandle {
    /// Registry identity
    pub id: Uuid,
    /// Client-supplied identifier from the URL; not unique
    pub client_id: String,
    sender: mpsc::Sender<OutboundMessage>,
    pub connected_at: DateTime<Utc>,
    /// Last activity timestamp (Unix seconds) - using AtomicI64 for lock-free updates
    last_activity: AtomicI64,
    closed: AtomicBool,
    close_notify: Notify,
    send_timeout: Duration,
}

impl ConnectionHandle {
    pub fn new(
        client_id: String,
        sender: mpsc::Sender<OutboundMessage>,
        send_timeout: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            client_id,
            sender,
            connected_at: now,
            last_activity: AtomicI64::new(now.timestamp()),
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
            send_timeout,
        }
    }

    pub fn update_activity(&self) {
        self.last_activity
            .store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.last_activity.load(Ordering::Relaxed), 0)
            .unwrap_or_else(Utc::now)
    }

    #[cfg(test)]
    pub(crate) fn set_last_activity(&self, at: DateTime<Utc>) {
        self.last_activity.store(at.timestamp(), Ordering::Relaxed);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark the connection closed and wake its session.
    ///
    /// Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        if first {
            self.close_notify.notify_waiters();
        }
        first
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        // notify_waiters reaches futures created before the flag check
        let notified = self.close_notify.notified();
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    /// Enqueue a message for the writer task.
    ///
    /// Fails without touching the queue once the connection is closed, and
    /// gives up after the configured send timeout when the queue stays full.
    /// A send waiting for queue space when the connection closes is
    /// abandoned and never enqueued.
    pub async fn send(&self, message: OutboundMessage) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed {
                connection_id: self.id,
            });
        }

        tokio::select! {
            biased;
            _ = self.closed() => Err(DeliveryError::Closed {
                connection_id: self.id,
            }),
            result = timeout(self.send_timeout, self.sender.send(message)) => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(DeliveryError::QueueClosed {
                    connection_id: self.id,
                }),
                Err(_) => Err(DeliveryError::Timeout {
                    connection_id: self.id,
                    timeout_ms: self.send_timeout.as_millis() as u64,
                }),
            },
        }
    }
}

/// A single send to one connection failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("connection {connection_id} is closed")]
    Closed { connection_id: Uuid },

    #[error("outbound queue of connection {connection_id} is gone")]
    QueueClosed { connection_id: Uuid },

    #[error("send to connection {connection_id} timed out after {timeout_ms}ms")]
    Timeout { connection_id: Uuid, timeout_ms: u64 },
}

impl DeliveryError {
    pub fn connection_id(&self) -> Uuid {
        match self {
            Self::Closed { connection_id }
            | Self::QueueClosed { connection_id }
            | Self::Timeout { connection_id, .. } => *connection_id,
        }
    }

    /// Short label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Closed { .. } => "closed",
            Self::QueueClosed { .. } => "queue_closed",
            Self::Timeout { .. } => "timeout",
        }
    }
}

/// Error returned when a connection cannot be accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Total connection limit exceeded ({current}/{max})")]
    LimitExceeded { current: usize, max: usize },
}

/// Limits for connection management
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub max_connections: usize,
    pub channel_buffer_size: usize,
    pub send_timeout: Duration,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_connections: 10000,
            channel_buffer_size: 32,
            send_timeout: Duration::from_millis(5000),
        }
    }
}

impl From<&WebSocketConfig> for ConnectionLimits {
    fn from(config: &WebSocketConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            channel_buffer_size: config.channel_buffer_size.max(1),
            send_timeout: Duration::from_millis(config.send_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(buffer: usize) -> (ConnectionHandle, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            ConnectionHandle::new("alice".to_string(), tx, Duration::from_millis(50)),
            rx,
        )
    }

    #[tokio::test]
    async fn test_send_enqueues() {
        let (handle, mut rx) = handle(4);

        handle.send(OutboundMessage::text("hello")).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.as_text(), Some("hello"));
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (handle, mut rx) = handle(4);

        assert!(handle.close());
        assert!(!handle.close());

        let err = handle.send(OutboundMessage::text("late")).await.unwrap_err();
        assert_eq!(err, DeliveryError::Closed { connection_id: handle.id });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_dropped_queue() {
        let (handle, rx) = handle(4);
        drop(rx);

        let err = handle.send(OutboundMessage::text("x")).await.unwrap_err();
        assert_eq!(err.reason(), "queue_closed");
    }

    #[tokio::test]
    async fn test_send_times_out_on_full_queue() {
        let (handle, _rx) = handle(1);

        handle.send(OutboundMessage::text("fills")).await.unwrap();
        let err = handle.send(OutboundMessage::text("blocked")).await.unwrap_err();

        assert!(matches!(err, DeliveryError::Timeout { timeout_ms: 50, .. }));
        assert_eq!(err.connection_id(), handle.id);
    }

    #[tokio::test]
    async fn test_close_abandons_send_blocked_on_full_queue() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = std::sync::Arc::new(ConnectionHandle::new(
            "alice".to_string(),
            tx,
            Duration::from_secs(10),
        ));
        handle.send(OutboundMessage::text("fills")).await.unwrap();

        let blocked = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.send(OutboundMessage::text("after-close")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        handle.close();
        let result = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("blocked send did not resolve")
            .unwrap();
        assert_eq!(result, Err(DeliveryError::Closed { connection_id: handle.id }));

        // The slot frees up, but nothing else was queued
        assert_eq!(rx.recv().await.unwrap().as_text(), Some("fills"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_resolves_after_close() {
        let (handle, _rx) = handle(1);
        let handle = std::sync::Arc::new(handle);

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.closed().await })
        };

        handle.close();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("closed() did not resolve")
            .unwrap();

        // Already closed: resolves immediately
        handle.closed().await;
    }

    #[test]
    fn test_limits_from_config() {
        let config = WebSocketConfig {
            channel_buffer_size: 0,
            send_timeout_ms: 250,
            max_connections: 3,
            ..Default::default()
        };

        let limits = ConnectionLimits::from(&config);
        assert_eq!(limits.max_connections, 3);
        assert_eq!(limits.channel_buffer_size, 1);
        assert_eq!(limits.send_timeout, Duration::from_millis(250));
    }
}

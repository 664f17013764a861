//! Connection registry - the authoritative set of live connections

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::metrics::ConnectionMetrics;
use crate::websocket::OutboundMessage;

use super::stats::ConnectionStats;
use super::types::{ConnectionError, ConnectionHandle, ConnectionLimits};

/// Manages all live WebSocket connections.
///
/// Membership only changes through [`accept`](Self::accept) and
/// [`remove`](Self::remove); readers get snapshots, never the map itself.
pub struct ConnectionRegistry {
    /// connection_id -> ConnectionHandle
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
    /// Slots taken against `max_connections`, reserved before insert
    reserved: AtomicUsize,
    limits: ConnectionLimits,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_limits(ConnectionLimits::default())
    }

    pub fn with_limits(limits: ConnectionLimits) -> Self {
        Self {
            connections: DashMap::new(),
            reserved: AtomicUsize::new(0),
            limits,
        }
    }

    pub fn limits(&self) -> &ConnectionLimits {
        &self.limits
    }

    /// Register a connection whose WebSocket handshake has completed.
    ///
    /// Returns the handle together with the receiving end of its outbound
    /// queue, which the caller hands to the connection's writer task.
    pub fn accept(
        &self,
        client_id: impl Into<String>,
    ) -> Result<(Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>), ConnectionError> {
        let client_id = client_id.into();

        let max = self.limits.max_connections;
        if let Err(current) =
            self.reserved
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |taken| {
                    (taken < max).then_some(taken + 1)
                })
        {
            return Err(ConnectionError::LimitExceeded { current, max });
        }

        let (tx, rx) = mpsc::channel(self.limits.channel_buffer_size);
        let handle = Arc::new(ConnectionHandle::new(
            client_id,
            tx,
            self.limits.send_timeout,
        ));

        self.connections.insert(handle.id, handle.clone());
        ConnectionMetrics::record_opened();

        tracing::info!(
            connection_id = %handle.id,
            client_id = %handle.client_id,
            total = self.connections.len(),
            "Connection registered"
        );

        Ok((handle, rx))
    }

    /// Remove a connection and mark it closed.
    ///
    /// Removing an unknown or already removed id is a no-op.
    pub fn remove(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        let (_, handle) = self.connections.remove(&connection_id)?;
        self.reserved.fetch_sub(1, Ordering::AcqRel);

        // A broadcast still holding this handle in its snapshot must not
        // enqueue to it
        handle.close();
        ConnectionMetrics::record_closed();

        tracing::info!(
            connection_id = %connection_id,
            client_id = %handle.client_id,
            total = self.connections.len(),
            "Connection unregistered"
        );

        Some(handle)
    }

    /// Copy of the current membership
    pub fn snapshot(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.iter().map(|r| r.value().clone()).collect()
    }

    /// Get connection by ID
    pub fn get(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&connection_id).map(|h| h.clone())
    }

    pub fn contains(&self, connection_id: Uuid) -> bool {
        self.connections.contains_key(&connection_id)
    }

    /// Get all connection IDs
    pub fn connection_ids(&self) -> Vec<Uuid> {
        self.connections.iter().map(|r| *r.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Get statistics
    pub fn stats(&self) -> ConnectionStats {
        let unique_clients: HashSet<String> = self
            .connections
            .iter()
            .map(|r| r.value().client_id.clone())
            .collect();

        ConnectionStats {
            total_connections: self.connections.len(),
            unique_clients: unique_clients.len(),
            max_connections: self.limits.max_connections,
        }
    }

    /// Find connections that have been inactive for longer than the timeout
    pub fn find_stale(&self, timeout_secs: u64) -> Vec<Uuid> {
        let now = Utc::now();
        let timeout = chrono::Duration::seconds(timeout_secs as i64);

        self.connections
            .iter()
            .filter(|entry| now.signed_duration_since(entry.value().last_activity()) > timeout)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Remove stale connections and return the count of removed connections
    pub fn evict_stale(&self, timeout_secs: u64) -> usize {
        let stale = self.find_stale(timeout_secs);

        stale
            .into_iter()
            .filter(|conn_id| {
                tracing::info!(connection_id = %conn_id, "Removing stale connection due to timeout");
                self.remove(*conn_id).is_some()
            })
            .count()
    }

    /// Remove every connection; used on shutdown
    pub fn close_all(&self) -> usize {
        self.connection_ids()
            .into_iter()
            .filter(|conn_id| self.remove(*conn_id).is_some())
            .count()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection_manager::DeliveryError;

    fn ids(registry: &ConnectionRegistry) -> HashSet<Uuid> {
        registry.connection_ids().into_iter().collect()
    }

    #[test]
    fn test_accept_registers() {
        let registry = ConnectionRegistry::new();

        let (handle, _rx) = registry.accept("alice").unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(handle.id));
        assert_eq!(registry.get(handle.id).unwrap().client_id, "alice");
        assert!(!handle.is_closed());
    }

    #[test]
    fn test_remove_any_member_leaves_the_rest() {
        for removed_index in 0..4 {
            let registry = ConnectionRegistry::new();
            let handles: Vec<_> = (0..4)
                .map(|i| registry.accept(format!("client-{}", i)).unwrap())
                .collect();

            let removed = handles[removed_index].0.id;
            registry.remove(removed);

            let expected: HashSet<Uuid> = handles
                .iter()
                .map(|(h, _)| h.id)
                .filter(|id| *id != removed)
                .collect();
            assert_eq!(ids(&registry), expected);
        }
    }

    #[test]
    fn test_remove_in_any_order() {
        let registry = ConnectionRegistry::new();
        let handles: Vec<_> = (0..3)
            .map(|i| registry.accept(format!("client-{}", i)).unwrap())
            .collect();

        registry.remove(handles[2].0.id);
        registry.remove(handles[0].0.id);

        assert_eq!(ids(&registry), HashSet::from([handles[1].0.id]));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = registry.accept("alice").unwrap();

        assert!(registry.remove(Uuid::new_v4()).is_none());
        assert_eq!(ids(&registry), HashSet::from([handle.id]));
    }

    #[test]
    fn test_remove_twice_matches_remove_once() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = registry.accept("a").unwrap();
        let (b, _rx_b) = registry.accept("b").unwrap();

        assert!(registry.remove(a.id).is_some());
        let after_once = ids(&registry);

        assert!(registry.remove(a.id).is_none());
        assert_eq!(ids(&registry), after_once);
        assert_eq!(after_once, HashSet::from([b.id]));
        assert!(a.is_closed());
    }

    #[test]
    fn test_accept_respects_limit() {
        let registry = ConnectionRegistry::with_limits(ConnectionLimits {
            max_connections: 2,
            ..Default::default()
        });

        let _a = registry.accept("a").unwrap();
        let _b = registry.accept("b").unwrap();
        let Err(err) = registry.accept("c") else {
            panic!("third connection should be refused");
        };

        assert_eq!(err, ConnectionError::LimitExceeded { current: 2, max: 2 });
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_slot_is_released_on_remove() {
        let registry = ConnectionRegistry::with_limits(ConnectionLimits {
            max_connections: 1,
            ..Default::default()
        });

        let (first, _rx) = registry.accept("a").unwrap();
        assert!(registry.accept("b").is_err());

        registry.remove(first.id);
        registry.remove(first.id);

        let (_second, _rx2) = registry.accept("b").unwrap();
        assert!(registry.accept("c").is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_accepts_never_exceed_limit() {
        let registry = Arc::new(ConnectionRegistry::with_limits(ConnectionLimits {
            max_connections: 50,
            ..Default::default()
        }));

        let workers: Vec<_> = (0..16)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    (0..10)
                        .filter(|i| registry.accept(format!("t{}-{}", t, i)).is_ok())
                        .count()
                })
            })
            .collect();
        let accepted: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();

        assert_eq!(accepted, 50);
        assert_eq!(registry.len(), 50);
    }

    #[tokio::test]
    async fn test_remove_abandons_send_waiting_on_full_queue() {
        let registry = Arc::new(ConnectionRegistry::with_limits(ConnectionLimits {
            channel_buffer_size: 1,
            send_timeout: std::time::Duration::from_secs(10),
            ..Default::default()
        }));
        let (handle, mut rx) = registry.accept("slow").unwrap();
        handle.send(OutboundMessage::text("queued")).await.unwrap();

        let pending = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.send(OutboundMessage::text("after-remove")).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        registry.remove(handle.id);

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(DeliveryError::Closed { .. })));
        assert_eq!(rx.recv().await.unwrap().as_text(), Some("queued"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_duplicate_client_ids_are_separate_connections() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = registry.accept("same").unwrap();
        let (second, _rx2) = registry.accept("same").unwrap();

        assert_ne!(first.id, second.id);
        let stats = registry.stats();
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.unique_clients, 1);
    }

    #[test]
    fn test_evict_stale() {
        let registry = ConnectionRegistry::new();
        let (stale, _rx1) = registry.accept("idle").unwrap();
        let (fresh, _rx2) = registry.accept("busy").unwrap();

        stale.set_last_activity(Utc::now() - chrono::Duration::seconds(600));

        assert_eq!(registry.find_stale(120), vec![stale.id]);
        assert_eq!(registry.evict_stale(120), 1);
        assert!(stale.is_closed());
        assert!(registry.contains(fresh.id));
    }

    #[test]
    fn test_close_all() {
        let registry = ConnectionRegistry::new();
        let handles: Vec<_> = (0..3)
            .map(|i| registry.accept(format!("c{}", i)).unwrap())
            .collect();

        assert_eq!(registry.close_all(), 3);
        assert!(registry.is_empty());
        assert!(handles.iter().all(|(h, _)| h.is_closed()));
    }
}

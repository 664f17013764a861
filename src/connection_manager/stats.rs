//! Connection statistics

use serde::Serialize;

/// Connection statistics
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    pub total_connections: usize,
    /// Distinct client identifiers among live connections
    pub unique_clients: usize,
    pub max_connections: usize,
}

//! Welcome and health check endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: String,
    pub docs: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub connections: ConnectionHealthResponse,
    pub storage: StorageHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct ConnectionHealthResponse {
    pub total: usize,
    pub unique_clients: usize,
}

#[derive(Debug, Serialize)]
pub struct StorageHealthResponse {
    pub backend: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_connections: Option<u32>,
}

/// GET / - Welcome message
pub async fn root(State(state): State<AppState>) -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: format!("Welcome to {}", state.settings.api.project_name),
        docs: format!("{}/items/", state.settings.api.prefix),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /health - Liveness plus a summary of connections and storage
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = state.start_time.elapsed().as_secs();
    let conn_stats = state.registry.stats();
    let storage_ok = state.items.is_healthy().await;

    let (pool_size, idle_connections) = match state.postgres_pool {
        Some(ref pool) => {
            let inner_pool = pool.pool();
            (Some(inner_pool.size()), Some(inner_pool.num_idle() as u32))
        }
        None => (None, None),
    };

    let status = if storage_ok { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        connections: ConnectionHealthResponse {
            total: conn_stats.total_connections,
            unique_clients: conn_stats.unique_clients,
        },
        storage: StorageHealthResponse {
            backend: state.items.backend_type().to_string(),
            connected: storage_ok,
            pool_size,
            idle_connections,
        },
    })
}

//! Chat channel statistics.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::broadcast::BroadcastStatsSnapshot;
use crate::connection_manager::ConnectionStats;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct ChatStatsResponse {
    pub connections: ConnectionStats,
    pub messages: BroadcastStatsSnapshot,
}

/// GET /api/v1/websocket/stats
pub async fn chat_stats(State(state): State<AppState>) -> Json<ChatStatsResponse> {
    Json(ChatStatsResponse {
        connections: state.registry.stats(),
        messages: state.broadcaster.stats(),
    })
}

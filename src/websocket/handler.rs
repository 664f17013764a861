use axum::{
    extract::{ws::rejection::WebSocketUpgradeRejection, Path, State, WebSocketUpgrade},
    response::Response,
};
use futures::StreamExt;

use crate::error::AppError;
use crate::metrics::ConnectionMetrics;
use crate::server::AppState;

use super::session::ChatSession;

/// WebSocket upgrade handler for `/ws/{client_id}`.
///
/// A request that cannot be upgraded is answered with `HANDSHAKE_FAILED` and
/// never reaches the registry.
#[tracing::instrument(name = "ws.upgrade", skip(state, ws))]
pub async fn ws_handler(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let ws = ws.map_err(|rejection| {
        ConnectionMetrics::record_rejected("handshake");
        tracing::warn!(error = %rejection, "WebSocket handshake failed");
        AppError::Handshake(rejection.body_text())
    })?;

    tracing::info!("WebSocket upgrade requested");

    let registry = state.registry.clone();
    let broadcaster = state.broadcaster.clone();
    let announce_joins = state.settings.websocket.announce_joins;
    let failed_client = client_id.clone();

    let response = ws
        .on_failed_upgrade(move |error| {
            ConnectionMetrics::record_rejected("handshake");
            tracing::warn!(client_id = %failed_client, error = %error, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            ChatSession::new(client_id, registry, broadcaster)
                .announce_joins(announce_joins)
                .run(stream, sink)
                .await;
        });

    Ok(response)
}

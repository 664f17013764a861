use axum::{routing::get, Router};

use crate::server::AppState;
use crate::websocket::ws_handler;

use super::chat::chat_stats;
use super::health::{health, root};
use super::items::{create_item, delete_item, get_item, list_items, update_item};
use super::metrics::prometheus_metrics;

pub fn api_routes(prefix: &str) -> Router<AppState> {
    let versioned = Router::new()
        // Items
        .route("/items/", get(list_items).post(create_item))
        .route(
            "/items/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        // Chat
        .route("/websocket/ws/{client_id}", get(ws_handler))
        .route("/websocket/stats", get(chat_stats));

    let router = Router::new()
        // Welcome, health & metrics
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics));

    // Router::nest rejects an empty or root prefix
    match prefix.trim_end_matches('/') {
        "" => router.merge(versioned),
        prefix => router.nest(prefix, versioned),
    }
}

//! API layer - HTTP endpoint handlers organized by domain.

mod chat;
mod health;
mod items;
mod metrics;
mod routes;

pub use chat::chat_stats;
pub use health::{health, root};
pub use items::{create_item, delete_item, get_item, list_items, update_item, ListQuery};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;

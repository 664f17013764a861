//! Chat message fanout across the connection registry.

mod broadcaster;
mod message;

pub use broadcaster::{BroadcastStatsSnapshot, Broadcaster, DeliveryReport};
pub use message::ChatMessage;

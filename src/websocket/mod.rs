mod handler;
mod message;
mod session;

pub use handler::ws_handler;
pub use message::OutboundMessage;
pub use session::{ChatSession, CloseReason, SessionState};

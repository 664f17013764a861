use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::Message;

/// Frame queued for a connection's writer task.
///
/// Text is shared, so one rendered broadcast is cloned cheaply per recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(Arc<str>),
    /// Server heartbeat
    Ping,
}

impl OutboundMessage {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Ping => None,
        }
    }

    pub fn into_ws_message(self) -> Message {
        match self {
            Self::Text(text) => Message::Text(text.as_ref().into()),
            Self::Ping => Message::Ping(Bytes::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frame() {
        let msg = OutboundMessage::text("Client #a says: hi");
        assert_eq!(msg.as_text(), Some("Client #a says: hi"));

        match msg.into_ws_message() {
            Message::Text(text) => assert_eq!(text.as_str(), "Client #a says: hi"),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_ping_frame() {
        assert_eq!(OutboundMessage::Ping.as_text(), None);
        assert!(matches!(OutboundMessage::Ping.into_ws_message(), Message::Ping(_)));
    }
}

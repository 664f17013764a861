use std::fmt;

/// A chat message as delivered to clients.
///
/// Rendered once per broadcast; the wire form is plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    /// Text sent by a client, annotated with its identifier
    Said { client_id: String, text: String },
    /// A client joined the chat
    Joined { client_id: String },
    /// A client left the chat
    Left { client_id: String },
    /// Server notice addressed to a single connection
    Notice(String),
}

impl ChatMessage {
    pub fn said(client_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Said {
            client_id: client_id.into(),
            text: text.into(),
        }
    }

    pub fn joined(client_id: impl Into<String>) -> Self {
        Self::Joined {
            client_id: client_id.into(),
        }
    }

    pub fn left(client_id: impl Into<String>) -> Self {
        Self::Left {
            client_id: client_id.into(),
        }
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self::Notice(text.into())
    }

    /// Short label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Said { .. } => "said",
            Self::Joined { .. } => "joined",
            Self::Left { .. } => "left",
            Self::Notice(_) => "notice",
        }
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Said { client_id, text } => write!(f, "Client #{} says: {}", client_id, text),
            Self::Joined { client_id } => write!(f, "Client #{} joined the chat", client_id),
            Self::Left { client_id } => write!(f, "Client #{} left the chat", client_id),
            Self::Notice(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(
            ChatMessage::said("alice", "hi").to_string(),
            "Client #alice says: hi"
        );
        assert_eq!(ChatMessage::left("a").to_string(), "Client #a left the chat");
        assert_eq!(
            ChatMessage::joined("bob").to_string(),
            "Client #bob joined the chat"
        );
        assert_eq!(ChatMessage::notice("plain").to_string(), "plain");
    }

    #[test]
    fn test_text_is_not_escaped() {
        let msg = ChatMessage::said("x y", "a: b #c");
        assert_eq!(msg.to_string(), "Client #x y says: a: b #c");
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages accepted from session WebSocket clients.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionInboundMessage {
    /// First message on every connection; binds the session to a user topic.
    Identification { user_id: String },
    /// Join a challenge topic (typically while viewing its details).
    WatchChallenge { challenge_id: Uuid },
    /// Leave a previously watched challenge topic.
    UnwatchChallenge { challenge_id: Uuid },
    /// Any unrecognized message type; logged and ignored.
    #[serde(other)]
    Unknown,
}

impl SessionInboundMessage {
    /// Parse a raw text frame.
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Positive acknowledgement sent after successful identification.
#[derive(Debug, Serialize)]
pub struct SessionAck {
    pub user_id: String,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identification_parses() {
        let msg =
            SessionInboundMessage::from_json_str(r#"{"type":"identification","user_id":"u1"}"#)
                .unwrap();
        assert!(matches!(msg, SessionInboundMessage::Identification { user_id } if user_id == "u1"));
    }

    #[test]
    fn watch_parses_with_uuid() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"watch_challenge","challenge_id":"{id}"}}"#);
        let msg = SessionInboundMessage::from_json_str(&raw).unwrap();
        assert!(
            matches!(msg, SessionInboundMessage::WatchChallenge { challenge_id } if challenge_id == id)
        );
    }

    #[test]
    fn unknown_types_fall_through() {
        let msg = SessionInboundMessage::from_json_str(r#"{"type":"buzz"}"#).unwrap();
        assert!(matches!(msg, SessionInboundMessage::Unknown));
    }
}

//! Frame types for the Parlor protocol.
//!
//! Field names are part of the wire contract and must not be renamed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message as delivered to room members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    /// Display name of the sender.
    pub name: String,
    /// Message body.
    pub message: String,
    /// When the room received the message.
    pub when: DateTime<Utc>,
    /// Avatar reference of the sender, empty when none was resolved.
    #[serde(default)]
    pub avatar_url: String,
}

impl ChatFrame {
    /// Create a frame stamped with the current time.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        message: impl Into<String>,
        avatar_url: impl Into<String>,
    ) -> Self {
        Self::at(name, message, avatar_url, Utc::now())
    }

    /// Create a frame with an explicit timestamp.
    #[must_use]
    pub fn at(
        name: impl Into<String>,
        message: impl Into<String>,
        avatar_url: impl Into<String>,
        when: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            when,
            avatar_url: avatar_url.into(),
        }
    }
}

/// A message as sent by a client.
///
/// Everything except the body is filled in by the server, so clients
/// cannot spoof a sender name or timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFrame {
    /// Message body.
    pub message: String,
}

impl ClientFrame {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_chat_frame_field_names() {
        let when = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let frame = ChatFrame::at("alice", "hi", "//avatar", when);

        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["name"], "alice");
        assert_eq!(value["message"], "hi");
        assert_eq!(value["avatar_url"], "//avatar");
        assert_eq!(value["when"], "2024-05-01T12:30:00Z");
    }

    #[test]
    fn test_chat_frame_missing_avatar_defaults_empty() {
        let frame: ChatFrame = serde_json::from_str(
            r#"{"name":"bob","message":"yo","when":"2024-05-01T12:30:00Z"}"#,
        )
        .unwrap();
        assert_eq!(frame.avatar_url, "");
    }

    #[test]
    fn test_client_frame_ignores_extra_fields() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"message":"hello","name":"mallory"}"#).unwrap();
        assert_eq!(frame, ClientFrame::new("hello"));
    }
}

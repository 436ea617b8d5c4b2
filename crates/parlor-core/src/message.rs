//! Chat message type shared between the hub and connection pumps.

use chrono::{DateTime, Utc};
use parlor_protocol::ChatFrame;

/// A message published to the room.
///
/// Messages are immutable once built; the hub shares one allocation
/// between every outbox it is queued on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Display name of the sender.
    pub name: String,
    /// Avatar reference of the sender.
    pub avatar_url: String,
    /// Message body.
    pub body: String,
    /// When the message was received.
    pub when: DateTime<Utc>,
}

impl Message {
    /// Create a new message stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar_url: String::new(),
            body: body.into(),
            when: Utc::now(),
        }
    }

    /// Attach the sender's avatar.
    #[must_use]
    pub fn with_avatar(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = avatar_url.into();
        self
    }

    /// Override the timestamp.
    #[must_use]
    pub fn with_when(mut self, when: DateTime<Utc>) -> Self {
        self.when = when;
        self
    }

    /// Build the wire record for this message.
    #[must_use]
    pub fn to_frame(&self) -> ChatFrame {
        ChatFrame::at(&self.name, &self.body, &self.avatar_url, self.when)
    }
}

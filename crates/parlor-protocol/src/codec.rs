//! Codec for encoding and decoding Parlor frames.
//!
//! Text frames are JSON, binary frames are MessagePack. A text frame that is
//! not a JSON object is taken verbatim as the message body, so plain
//! `websocket.send("hi")` clients work without any framing of their own.

use bytes::Bytes;
use thiserror::Error;

use crate::frames::{ChatFrame, ClientFrame};

/// Maximum encoded frame size (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MessagePack encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding error.
    #[error("Decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Outbound frame encoding, chosen once per connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    /// JSON text frames.
    #[default]
    Json,
    /// MessagePack binary frames.
    MessagePack,
}

impl Encoding {
    /// Parse an encoding name as used in the `format` query parameter.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "msgpack" | "messagepack" => Some(Self::MessagePack),
            _ => None,
        }
    }
}

/// An encoded outbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedFrame {
    Text(String),
    Binary(Bytes),
}

impl EncodedFrame {
    /// Whether this is a text frame.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encode a chat frame for delivery.
///
/// # Errors
///
/// Returns an error if the frame is too large or serialization fails.
pub fn encode(frame: &ChatFrame, encoding: Encoding) -> Result<EncodedFrame, ProtocolError> {
    let encoded = match encoding {
        Encoding::Json => EncodedFrame::Text(serde_json::to_string(frame)?),
        Encoding::MessagePack => EncodedFrame::Binary(Bytes::from(rmp_serde::to_vec_named(frame)?)),
    };

    if encoded.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(encoded.len()));
    }

    Ok(encoded)
}

/// Decode an inbound text frame.
///
/// # Errors
///
/// Returns an error if the text looks like a JSON object but does not
/// decode into a [`ClientFrame`].
pub fn decode_text(text: &str) -> Result<ClientFrame, ProtocolError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(text.len()));
    }

    if text.trim_start().starts_with('{') {
        return Ok(serde_json::from_str(text)?);
    }

    Ok(ClientFrame::new(text))
}

/// Decode an inbound binary frame.
///
/// # Errors
///
/// Returns an error if the data is too large or not a MessagePack
/// [`ClientFrame`].
pub fn decode_binary(data: &[u8]) -> Result<ClientFrame, ProtocolError> {
    if data.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(data.len()));
    }

    Ok(rmp_serde::from_slice(data)?)
}

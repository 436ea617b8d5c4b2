//! Transport abstraction traits for Parlor.
//!
//! These traits define the interface that all transport implementations must provide,
//! allowing the room to be transport-agnostic.

use async_trait::async_trait;
use parlor_protocol::{ChatFrame, ClientFrame, ProtocolError};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// A frame arrived but could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl TransportError {
    /// Whether the connection can keep going after this error.
    ///
    /// Only decode failures are recoverable: the offending frame is
    /// dropped and the next one is read.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

/// The inbound half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Receive the next frame from the peer.
    ///
    /// Returns `None` if the connection is closed cleanly.
    async fn recv(&mut self) -> Result<Option<ClientFrame>, TransportError>;
}

/// The outbound half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send a frame to the peer.
    async fn send(&mut self, frame: &ChatFrame) -> Result<(), TransportError>;

    /// Close the outbound direction, releasing the underlying connection.
    ///
    /// Closing twice is not an error.
    async fn close(&mut self) -> Result<(), TransportError>;
}

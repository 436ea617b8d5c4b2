//! WebSocket transport implementation.
//!
//! Adapts an upgraded axum [`WebSocket`] into a [`FrameSource`] / [`FrameSink`] pair.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parlor_protocol::{codec, ChatFrame, ClientFrame, EncodedFrame, Encoding, ProtocolError};
use tracing::{debug, warn};

use crate::traits::{FrameSink, FrameSource, TransportError};

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Maximum inbound message size in bytes.
    pub max_message_size: usize,
    /// Encoding used for outbound frames.
    pub encoding: Encoding,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024, // 64 KB
            encoding: Encoding::Json,
        }
    }
}

/// Split an upgraded socket into independently owned halves.
#[must_use]
pub fn split(socket: WebSocket, config: &WebSocketConfig) -> (WebSocketSource, WebSocketSink) {
    let (sink, stream) = socket.split();
    (
        WebSocketSource {
            stream,
            max_message_size: config.max_message_size,
        },
        WebSocketSink {
            sink,
            encoding: config.encoding,
            is_open: true,
        },
    )
}

/// The read half of a WebSocket connection.
pub struct WebSocketSource {
    stream: SplitStream<WebSocket>,
    max_message_size: usize,
}

impl WebSocketSource {
    fn check_size(&self, len: usize) -> Result<(), TransportError> {
        if len > self.max_message_size {
            warn!(
                "Message too large: {} bytes (max: {})",
                len, self.max_message_size
            );
            return Err(ProtocolError::FrameTooLarge(len).into());
        }
        Ok(())
    }
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn recv(&mut self) -> Result<Option<ClientFrame>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    self.check_size(text.len())?;
                    return Ok(Some(codec::decode_text(&text)?));
                }
                Some(Ok(Message::Binary(data))) => {
                    self.check_size(data.len())?;
                    return Ok(Some(codec::decode_binary(&data)?));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // Pongs are queued by the socket itself
                }
                Some(Ok(Message::Close(_))) => {
                    debug!("Received close frame");
                    return Ok(None);
                }
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    debug!("WebSocket stream ended");
                    return Ok(None);
                }
            }
        }
    }
}

/// The write half of a WebSocket connection.
pub struct WebSocketSink {
    sink: SplitSink<WebSocket, Message>,
    encoding: Encoding,
    is_open: bool,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send(&mut self, frame: &ChatFrame) -> Result<(), TransportError> {
        if !self.is_open {
            return Err(TransportError::ConnectionClosed);
        }

        let message = match codec::encode(frame, self.encoding)? {
            EncodedFrame::Text(text) => Message::Text(text),
            EncodedFrame::Binary(data) => Message::Binary(data.to_vec()),
        };

        self.sink
            .send(message)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !std::mem::replace(&mut self.is_open, false) {
            return Ok(()); // Already closed
        }

        self.sink
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to close: {}", e)))
    }
}

//! In-process duplex transport.
//!
//! [`duplex`] returns the two connection halves the room sees plus a
//! [`MemoryPeer`] that plays the remote client. The outbound direction is
//! bounded, so a peer that stops reading applies backpressure exactly like a
//! stalled socket would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parlor_protocol::{ChatFrame, ClientFrame};
use tokio::sync::mpsc;

use crate::traits::{FrameSink, FrameSource, TransportError};

type Inbound = Result<ClientFrame, TransportError>;

/// Create a connected source/sink pair and the peer driving it.
///
/// `capacity` bounds the number of unread outbound frames.
#[must_use]
pub fn duplex(capacity: usize) -> (MemorySource, MemorySink, MemoryPeer) {
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
    let broken = Arc::new(AtomicBool::new(false));
    let closed = Arc::new(AtomicBool::new(false));

    (
        MemorySource { rx: inbound_rx },
        MemorySink {
            tx: Some(outbound_tx),
            broken: Arc::clone(&broken),
            closed: Arc::clone(&closed),
        },
        MemoryPeer {
            tx: Some(inbound_tx),
            rx: outbound_rx,
            broken,
            closed,
        },
    )
}

/// Inbound half of an in-memory connection.
pub struct MemorySource {
    rx: mpsc::Receiver<Inbound>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn recv(&mut self) -> Result<Option<ClientFrame>, TransportError> {
        match self.rx.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Outbound half of an in-memory connection.
pub struct MemorySink {
    tx: Option<mpsc::Sender<ChatFrame>>,
    broken: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: &ChatFrame) -> Result<(), TransportError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("broken pipe".into()));
        }

        let tx = self.tx.as_ref().ok_or(TransportError::ConnectionClosed)?;
        tx.send(frame.clone())
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// The remote end of an in-memory connection.
pub struct MemoryPeer {
    tx: Option<mpsc::Sender<Inbound>>,
    rx: mpsc::Receiver<ChatFrame>,
    broken: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MemoryPeer {
    /// Send a message body to the room.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection has been hung up.
    pub async fn send(&self, message: impl Into<String>) -> Result<(), TransportError> {
        self.push(Ok(ClientFrame::new(message))).await
    }

    /// Deliver a transport error to the reading side.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection has been hung up.
    pub async fn send_error(&self, error: TransportError) -> Result<(), TransportError> {
        self.push(Err(error)).await
    }

    async fn push(&self, item: Inbound) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::ConnectionClosed)?;
        tx.send(item)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Close the inbound direction, as if the client disconnected.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }

    /// Make every further write on the sink fail.
    pub fn break_writes(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    /// Receive the next frame written by the room.
    ///
    /// Returns `None` once the sink is closed and drained.
    pub async fn recv(&mut self) -> Option<ChatFrame> {
        self.rx.recv().await
    }

    /// Receive a frame if one is already buffered.
    pub fn try_recv(&mut self) -> Option<ChatFrame> {
        self.rx.try_recv().ok()
    }

    /// Whether the room closed the outbound direction.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_peer_to_source() {
        let (mut source, _sink, mut peer) = duplex(4);

        peer.send("hello").await.unwrap();
        let frame = source.recv().await.unwrap().unwrap();
        assert_eq!(frame.message, "hello");

        peer.hang_up();
        assert!(source.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sink_to_peer_and_close() {
        let (_source, mut sink, mut peer) = duplex(4);

        sink.send(&ChatFrame::new("alice", "hi", "")).await.unwrap();
        sink.close().await.unwrap();
        sink.close().await.unwrap();

        assert!(peer.is_closed());
        assert_eq!(peer.recv().await.unwrap().message, "hi");
        assert!(peer.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_broken_writes_fail() {
        let (_source, mut sink, peer) = duplex(4);

        peer.break_writes();
        let err = sink.send(&ChatFrame::new("alice", "hi", "")).await;
        assert!(matches!(err, Err(TransportError::SendFailed(_))));
    }

    #[tokio::test]
    async fn test_source_surfaces_errors() {
        let (mut source, _sink, peer) = duplex(4);

        peer.send_error(TransportError::ReceiveFailed("reset".into()))
            .await
            .unwrap();
        assert!(matches!(
            source.recv().await,
            Err(TransportError::ReceiveFailed(_))
        ));
    }
}

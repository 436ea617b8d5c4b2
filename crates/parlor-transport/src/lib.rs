//! # parlor-transport
//!
//! Transport abstraction layer for the Parlor chat room.
//!
//! A connection is split into two halves so the read and write directions
//! can be pumped by independent tasks:
//!
//! - [`FrameSource`] - yields decoded client frames until the peer goes away
//! - [`FrameSink`] - writes chat frames and closes the outbound direction
//!
//! Implementations:
//!
//! - **WebSocket** - an upgraded axum socket (feature `websocket`)
//! - **Memory** - an in-process duplex used by tests and benchmarks
//!
//! ```rust,ignore
//! use parlor_transport::{FrameSink, FrameSource};
//!
//! async fn echo(mut source: impl FrameSource, mut sink: impl FrameSink) {
//!     while let Ok(Some(frame)) = source.recv().await {
//!         // Process frame
//!     }
//!     let _ = sink.close().await;
//! }
//! ```

pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use traits::{FrameSink, FrameSource, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketSink, WebSocketSource};

//! # parlor-core
//!
//! The room hub and connection agents for the Parlor chat server.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Hub** - The coordination loop that owns room membership and fans
//!   messages out
//! - **Client** - A connection agent pumping frames between a transport and
//!   the hub
//! - **Message** - The immutable chat message shared between outboxes
//! - **Tracer** - Diagnostic sink for room events
//!
//! ## Architecture
//!
//! ```text
//!                 join / leave / publish
//! ┌─────────────┐ ─────────────────────▶ ┌─────────────┐
//! │   Client    │                        │     Hub     │
//! │ read  write │ ◀───────────────────── │  (members)  │
//! └─────────────┘   bounded outbox       └─────────────┘
//!    ▲       │
//!    │       ▼
//! ┌─────────────┐
//! │  Transport  │
//! └─────────────┘
//! ```
//!
//! Membership is only ever touched by the hub's loop. Clients talk to it
//! through a [`HubHandle`], and each client's outbox is written by the hub
//! and read by that client's write pump.

pub mod client;
pub mod hub;
pub mod message;
pub mod trace;

pub use client::{Client, ClientId, Profile};
pub use hub::{Hub, HubConfig, HubError, HubHandle, HubStats, DEFAULT_OUTBOX_CAPACITY};
pub use message::Message;
pub use trace::{MemoryTracer, Tracer, TracingTracer};

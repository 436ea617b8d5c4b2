//! Connection agents.
//!
//! A [`Client`] bridges one duplex connection to the hub with two pumps:
//! the read pump publishes whatever the peer sends, and the write pump
//! drains the client's outbox to the peer.

use crate::hub::{HubError, HubHandle, Outbox, OutboxReceiver};
use crate::message::Message;
use parlor_transport::{FrameSink, FrameSource};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a connected client.
///
/// Ids are handed out from a process-wide counter and never reused, so two
/// live clients never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Allocate a fresh id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Display data of the person behind a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    /// Display name.
    pub name: String,
    /// Avatar reference, empty when none was resolved.
    pub avatar_url: String,
}

impl Profile {
    /// Create a profile from a display name and avatar reference.
    #[must_use]
    pub fn new(name: impl Into<String>, avatar_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar_url: avatar_url.into(),
        }
    }
}

/// A connection agent.
pub struct Client {
    id: ClientId,
    profile: Profile,
    hub: HubHandle,
    outbox: Outbox,
    outbox_rx: OutboxReceiver,
}

impl Client {
    /// Create a client with a fresh id and an outbox sized by the hub.
    #[must_use]
    pub fn new(hub: HubHandle, profile: Profile) -> Self {
        let (outbox, outbox_rx) = hub.outbox();
        Self {
            id: ClientId::next(),
            profile,
            hub,
            outbox,
            outbox_rx,
        }
    }

    /// This client's id.
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Who is behind this connection.
    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Join the room and pump frames until the connection ends.
    ///
    /// The connection ends when the peer stops sending, when a write fails,
    /// or when the hub closes this client's outbox (eviction or shutdown).
    /// In every case the client is unregistered and the outbound side is
    /// closed before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub stopped before the client
    /// could join. Nothing is pumped in that case.
    pub async fn run<R, W>(self, source: R, sink: W) -> Result<(), HubError>
    where
        R: FrameSource,
        W: FrameSink + 'static,
    {
        let Client {
            id,
            profile,
            hub,
            outbox,
            outbox_rx,
        } = self;

        hub.register(id, profile.name.clone(), outbox).await?;
        debug!(client = %id, name = %profile.name, "Client joined");

        let mut writer = tokio::spawn(write_pump(id, outbox_rx, sink));

        let writer_done = tokio::select! {
            () = read_pump(id, &profile, &hub, source) => false,
            _ = &mut writer => true,
        };

        hub.unregister(id).await;

        if !writer_done {
            // The outbox is closed now, so the writer drains and exits.
            if let Err(e) = writer.await {
                warn!(client = %id, error = %e, "Write pump panicked");
            }
        }

        debug!(client = %id, "Client left");
        Ok(())
    }
}

/// Forward frames from the peer to the hub until the peer goes away.
///
/// Dropping `source` on return releases the inbound transport.
async fn read_pump<R: FrameSource>(id: ClientId, profile: &Profile, hub: &HubHandle, mut source: R) {
    loop {
        let frame = match source.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(client = %id, "Connection closed by peer");
                return;
            }
            Err(e) if e.is_recoverable() => {
                warn!(client = %id, error = %e, "Dropping undecodable frame");
                continue;
            }
            Err(e) => {
                debug!(client = %id, error = %e, "Read failed");
                return;
            }
        };

        let message = Message::new(&profile.name, frame.message).with_avatar(&profile.avatar_url);

        if hub.publish(message).await.is_err() {
            debug!(client = %id, "Hub closed");
            return;
        }
    }
}

/// Drain the outbox to the peer, then close the outbound transport.
async fn write_pump<W: FrameSink>(id: ClientId, mut outbox: OutboxReceiver, mut sink: W) {
    while let Some(message) = outbox.recv().await {
        if let Err(e) = sink.send(&message.to_frame()).await {
            debug!(client = %id, error = %e, "Write failed");
            return;
        }
    }

    if let Err(e) = sink.close().await {
        debug!(client = %id, error = %e, "Close failed");
    }
}

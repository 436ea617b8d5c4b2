//! The room hub.
//!
//! The hub owns the member set. Every join, leave and broadcast is handed to
//! its coordination loop over a channel and applied there one at a time, so
//! the set is never touched by two tasks and needs no lock. Eviction of slow
//! members happens inside the same loop.

use crate::client::ClientId;
use crate::message::Message;
use crate::trace::{self, Tracer};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

/// Default number of undelivered messages an outbox may hold.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Default depth of each hub request queue.
const DEFAULT_REQUEST_CAPACITY: usize = 64;

/// Write half of a member's outbox.
pub type Outbox = mpsc::Sender<Arc<Message>>;

/// Read half of a member's outbox.
pub type OutboxReceiver = mpsc::Receiver<Arc<Message>>;

/// Hub errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    /// The coordination loop has stopped.
    #[error("Hub is closed")]
    Closed,
}

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each member's outbox.
    pub outbox_capacity: usize,
    /// Depth of the join, leave and inbound request queues.
    pub request_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            request_capacity: DEFAULT_REQUEST_CAPACITY,
        }
    }
}

/// Hub statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Current number of members.
    pub members: usize,
    /// Messages fanned out since start.
    pub published: u64,
    /// Members evicted for falling behind.
    pub evicted: u64,
}

struct JoinRequest {
    id: ClientId,
    name: String,
    outbox: Outbox,
    done: oneshot::Sender<()>,
}

struct LeaveRequest {
    id: ClientId,
    done: oneshot::Sender<bool>,
}

struct Broadcast {
    message: Arc<Message>,
    done: oneshot::Sender<usize>,
}

enum Query {
    Stats(oneshot::Sender<HubStats>),
    Members(oneshot::Sender<Vec<ClientId>>),
}

struct Member {
    name: String,
    outbox: Outbox,
}

/// The coordination loop and the state only it may touch.
pub struct Hub {
    members: HashMap<ClientId, Member>,
    joins: mpsc::Receiver<JoinRequest>,
    leaves: mpsc::Receiver<LeaveRequest>,
    inbound: mpsc::Receiver<Broadcast>,
    queries: mpsc::Receiver<Query>,
    shutdown: watch::Receiver<bool>,
    tracer: Arc<dyn Tracer>,
    published: u64,
    evicted: u64,
}

impl Hub {
    /// Create a hub with default configuration and no tracing.
    #[must_use]
    pub fn new() -> (Self, HubHandle) {
        Self::with_config(HubConfig::default(), trace::off())
    }

    /// Create a hub with custom configuration.
    ///
    /// The hub does nothing until [`Hub::run`] is awaited.
    #[must_use]
    pub fn with_config(config: HubConfig, tracer: Arc<dyn Tracer>) -> (Self, HubHandle) {
        info!("Creating hub with config: {:?}", config);

        let depth = config.request_capacity.max(1);
        let (join_tx, joins) = mpsc::channel(depth);
        let (leave_tx, leaves) = mpsc::channel(depth);
        let (inbound_tx, inbound) = mpsc::channel(depth);
        let (query_tx, queries) = mpsc::channel(depth);
        let (shutdown_tx, shutdown) = watch::channel(false);

        let hub = Self {
            members: HashMap::new(),
            joins,
            leaves,
            inbound,
            queries,
            shutdown,
            tracer,
            published: 0,
            evicted: 0,
        };

        let handle = HubHandle {
            joins: join_tx,
            leaves: leave_tx,
            inbound: inbound_tx,
            queries: query_tx,
            shutdown: Arc::new(shutdown_tx),
            outbox_capacity: config.outbox_capacity.max(1),
        };

        (hub, handle)
    }

    /// Create a hub and run it on a new task.
    #[must_use]
    pub fn spawn(config: HubConfig, tracer: Arc<dyn Tracer>) -> HubHandle {
        let (hub, handle) = Self::with_config(config, tracer);
        tokio::spawn(hub.run());
        handle
    }

    /// Run the coordination loop.
    ///
    /// Returns after [`HubHandle::shutdown`] or once every handle has been
    /// dropped. All remaining outboxes are closed on the way out.
    pub async fn run(mut self) {
        debug!("Hub running");

        loop {
            tokio::select! {
                Some(request) = self.joins.recv() => self.join(request),
                Some(request) = self.leaves.recv() => self.leave(request),
                Some(broadcast) = self.inbound.recv() => self.broadcast(broadcast),
                Some(query) = self.queries.recv() => self.answer(query),
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                else => break,
            }
        }

        let remaining = self.members.len();
        self.members.clear();
        self.tracer.trace("room closed");
        debug!(members = remaining, "Hub stopped");
    }

    fn join(&mut self, request: JoinRequest) {
        let JoinRequest {
            id,
            name,
            outbox,
            done,
        } = request;

        self.members.insert(id, Member { name, outbox });
        self.tracer.trace(&format!("new client joined: {}", id));
        let _ = done.send(());
    }

    fn leave(&mut self, request: LeaveRequest) {
        // Removing the member drops the hub's sender, which closes the
        // outbox. A client already evicted has no entry left to close.
        let removed = self.members.remove(&request.id);
        if let Some(member) = &removed {
            self.tracer
                .trace(&format!("client left: {} ({})", request.id, member.name));
        }
        let _ = request.done.send(removed.is_some());
    }

    fn broadcast(&mut self, broadcast: Broadcast) {
        let Broadcast { message, done } = broadcast;
        let tracer = &self.tracer;
        let mut delivered = 0;
        let mut evicted = 0;

        tracer.trace(&format!("message received: {}", message.body));

        self.members.retain(|id, member| {
            match member.outbox.try_send(Arc::clone(&message)) {
                Ok(()) => {
                    tracer.trace(&format!(" -- sent to {}", id));
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    tracer.trace(&format!(
                        " -- outbox full, evicting {} ({})",
                        id, member.name
                    ));
                    evicted += 1;
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    tracer.trace(&format!(
                        " -- outbox gone, evicting {} ({})",
                        id, member.name
                    ));
                    evicted += 1;
                    false
                }
            }
        });

        self.published += 1;
        self.evicted += evicted;
        let _ = done.send(delivered);
    }

    fn answer(&self, query: Query) {
        match query {
            Query::Stats(reply) => {
                let _ = reply.send(HubStats {
                    members: self.members.len(),
                    published: self.published,
                    evicted: self.evicted,
                });
            }
            Query::Members(reply) => {
                let mut ids: Vec<ClientId> = self.members.keys().copied().collect();
                ids.sort_unstable();
                let _ = reply.send(ids);
            }
        }
    }
}

/// A cloneable handle for talking to a running hub.
///
/// Every request waits until the loop has applied it, so a task that
/// registers and then publishes is guaranteed to receive its own message.
#[derive(Clone)]
pub struct HubHandle {
    joins: mpsc::Sender<JoinRequest>,
    leaves: mpsc::Sender<LeaveRequest>,
    inbound: mpsc::Sender<Broadcast>,
    queries: mpsc::Sender<Query>,
    shutdown: Arc<watch::Sender<bool>>,
    outbox_capacity: usize,
}

impl HubHandle {
    /// Create an outbox sized for this hub.
    #[must_use]
    pub fn outbox(&self) -> (Outbox, OutboxReceiver) {
        mpsc::channel(self.outbox_capacity)
    }

    /// Register a member.
    ///
    /// The hub takes ownership of `outbox`; the member's outbox closes
    /// when the hub drops it on leave, eviction or shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn register(
        &self,
        id: ClientId,
        name: impl Into<String>,
        outbox: Outbox,
    ) -> Result<(), HubError> {
        let (done, ack) = oneshot::channel();
        let request = JoinRequest {
            id,
            name: name.into(),
            outbox,
            done,
        };
        self.joins
            .send(request)
            .await
            .map_err(|_| HubError::Closed)?;
        ack.await.map_err(|_| HubError::Closed)
    }

    /// Unregister a member and close its outbox.
    ///
    /// Returns `true` if the member was present. Unregistering an unknown or
    /// already removed member, or talking to a stopped hub, is a no-op.
    pub async fn unregister(&self, id: ClientId) -> bool {
        let (done, ack) = oneshot::channel();
        if self.leaves.send(LeaveRequest { id, done }).await.is_err() {
            return false;
        }
        ack.await.unwrap_or(false)
    }

    /// Publish a message to every current member.
    ///
    /// Returns the number of members the message was queued for. Members
    /// whose outbox is full are evicted rather than waited on.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn publish(&self, message: Message) -> Result<usize, HubError> {
        let (done, ack) = oneshot::channel();
        let broadcast = Broadcast {
            message: Arc::new(message),
            done,
        };
        self.inbound
            .send(broadcast)
            .await
            .map_err(|_| HubError::Closed)?;
        ack.await.map_err(|_| HubError::Closed)
    }

    /// Get hub statistics.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply, rx) = oneshot::channel();
        self.query(Query::Stats(reply)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Get the current members, in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn members(&self) -> Result<Vec<ClientId>, HubError> {
        let (reply, rx) = oneshot::channel();
        self.query(Query::Members(reply)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    async fn query(&self, query: Query) -> Result<(), HubError> {
        self.queries.send(query).await.map_err(|_| HubError::Closed)
    }

    /// Stop the hub, closing every member's outbox.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Whether the coordination loop has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed()
    }
}

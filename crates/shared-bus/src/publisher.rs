//! # Messaging Port and In-Process Gossip
//!
//! `Messaging` is what subsystems publish through. `InMemoryGossip` is an
//! endpoint on a `GossipNetwork` shared by all peers of one process, built on
//! `tokio::sync::broadcast`. Keypers in separate processes use
//! [`TcpGossip`](crate::tcp::TcpGossip) instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::InstanceId;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::BusResult;
use crate::messages::{P2PMessage, Topic};
use crate::subscriber::Subscription;
use crate::validator::{MessageValidator, ValidatorRegistry};
use crate::DEFAULT_CHANNEL_CAPACITY;

#[async_trait]
pub trait Messaging: Send + Sync {
    /// Publish to all peers.
    async fn send(&self, msg: P2PMessage) -> BusResult<()>;

    /// Stream of validated inbound messages from other peers.
    fn subscribe(&self) -> Subscription;

    fn add_validator(&self, topic: Topic, validator: Arc<dyn MessageValidator>);
}

/// Raw frame on the shared network.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub from: u64,
    pub data: Arc<Vec<u8>>,
}

/// The medium peers publish onto. Cloning shares the medium.
#[derive(Debug, Clone)]
pub struct GossipNetwork {
    pub(crate) sender: broadcast::Sender<Frame>,
    next_peer: Arc<AtomicU64>,
}

impl GossipNetwork {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            next_peer: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fresh id for a peer or a remote connection on this network.
    pub(crate) fn allocate_peer(&self) -> u64 {
        self.next_peer.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of live subscriptions across all peers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for GossipNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// One peer's endpoint.
pub struct InMemoryGossip {
    peer: u64,
    network: GossipNetwork,
    validators: Arc<ValidatorRegistry>,
    sent: Mutex<Vec<P2PMessage>>,
    messages_sent: AtomicU64,
}

impl InMemoryGossip {
    /// Endpoint on a private network.
    pub fn new(instance_id: InstanceId) -> Self {
        Self::join(&GossipNetwork::new(), instance_id)
    }

    pub fn join(network: &GossipNetwork, instance_id: InstanceId) -> Self {
        Self {
            peer: network.allocate_peer(),
            network: network.clone(),
            validators: Arc::new(ValidatorRegistry::new(instance_id)),
            sent: Mutex::new(Vec::new()),
            messages_sent: AtomicU64::new(0),
        }
    }

    pub fn peer_id(&self) -> u64 {
        self.peer
    }

    /// Every message this endpoint published, in order.
    pub fn sent_messages(&self) -> Vec<P2PMessage> {
        self.sent.lock().clone()
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for InMemoryGossip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGossip")
            .field("peer", &self.peer)
            .field("instance_id", &self.validators.instance_id())
            .finish()
    }
}

#[async_trait]
impl Messaging for InMemoryGossip {
    async fn send(&self, msg: P2PMessage) -> BusResult<()> {
        let data = Arc::new(msg.encode()?);
        let topic = msg.topic();
        debug!(peer = self.peer, topic = %topic, msg = %msg.log_info(), "publishing");

        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.sent.lock().push(msg);

        // no subscribers is not an error: nobody else is online
        if self
            .network
            .sender
            .send(Frame {
                from: self.peer,
                data,
            })
            .is_err()
        {
            debug!(peer = self.peer, topic = %topic, "no peers listening");
        }
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(
            self.network.sender.subscribe(),
            self.peer,
            self.validators.clone(),
        )
    }

    fn add_validator(&self, topic: Topic, validator: Arc<dyn MessageValidator>) {
        self.validators.add_validator(topic, validator);
    }
}

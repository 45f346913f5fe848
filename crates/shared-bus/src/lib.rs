//! # Shared Bus - Gossip Messaging
//!
//! The keyper's peer-to-peer surface: message types for the four gossip
//! topics, the `Messaging` port every subsystem publishes through, and the
//! validator registry inbound messages must pass before delivery.
//!
//! ```text
//! ┌──────────────┐   send()    ┌────────────────┐   recv()   ┌──────────────┐
//! │ Epoch keys   │ ──────────▶ │ GossipNetwork  │ ─────────▶ │ Peer keyper  │
//! │ Eon publisher│             │ (topic-tagged) │ validators │ handlers     │
//! └──────────────┘             └────────────────┘            └──────────────┘
//! ```
//!
//! ## Delivery rules
//!
//! - A peer never receives its own messages.
//! - Messages whose `instance_id` differs from the local one are rejected.
//! - Rejected and ignored messages are dropped and not delivered.
//!
//! ## Transports
//!
//! - `InMemoryGossip` connects peers inside one process (tests, single node).
//! - `TcpGossip` connects keyper processes over length-prefixed TCP frames.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod messages;
pub mod publisher;
pub mod subscriber;
pub mod tcp;
pub mod validator;

pub use error::{BusError, BusResult};
pub use messages::{
    DecryptionKey, DecryptionKeyShare, DecryptionTrigger, EonPublicKey, P2PMessage, Topic,
};
pub use publisher::{GossipNetwork, InMemoryGossip, Messaging};
pub use subscriber::Subscription;
pub use tcp::{parse_peer_address, TcpGossip, TcpGossipConfig};
pub use validator::{MessageValidator, ValidationResult, ValidatorRegistry};

/// Messages buffered per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

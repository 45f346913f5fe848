//! # KP-08 Eon Publisher
//!
//! Broadcasts the public key of every eon whose DKG this keyper finished.
//!
//! ```text
//! ShuttermintState ──finalize──► eon_public_key_pending ──tick──► EonKeyPublisher ──► gossip
//! ```
//!
//! A pending row whose keyper set does not contain this node stops the
//! publisher: the reducer queues keys only for eons it took part in.

pub mod error;
pub mod publisher;

pub use error::{PublisherError, PublisherResult};
pub use publisher::{EonKeyPublisher, PUBLISH_INTERVAL};

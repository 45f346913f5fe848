//! # KP-07 Epoch Keys
//!
//! Produces the epoch decryption keys of the active eon.
//!
//! ```text
//! trigger (HTTP/gossip) ──► own share ──► gossip
//!                                │
//! peer shares (gossip) ──► stored shares ──► threshold met ──► key ──► gossip
//! ```
//!
//! ## Guarantees
//!
//! | Property | How |
//! |----------|-----|
//! | one own share per `(eon, epoch)` | share row checked and written in the trigger's transaction |
//! | one key per `(eon, epoch)` | conditional insert decides who emits |
//! | only valid peer input stored | [`EpochKeyHandler`] is the gossip validator for shares, keys and triggers |
//!
//! Keys and shares are only ever derived from the persisted DKG result,
//! never from a running DKG.

pub mod domain;
pub mod error;
pub mod handler;
pub mod ports;
pub mod service;

#[cfg(test)]
mod test_support;

pub use domain::trigger::{TriggerDrop, TriggerRequest};
pub use error::{EpochKeyError, EpochKeyResult};
pub use handler::EpochKeyHandler;
pub use ports::inbound::TriggerSink;
pub use service::{trigger_channel, EpochKeyService, TriggerQueue, TRIGGER_QUEUE_CAPACITY};

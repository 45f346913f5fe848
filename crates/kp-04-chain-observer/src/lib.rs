//! # KP-04 Chain Observer
//!
//! Turns the L1 event stream into chain-observer table rows.
//!
//! ```text
//! EventSyncer ──update──► ChainObserver ──tx──► handler ──► keyper_set / collator rows
//!                               │
//!                               └──► sync cursor (same tx)
//! ```
//!
//! ## Handlers
//!
//! | Event | Handler | Rows |
//! |-------|---------|------|
//! | `KeypersConfigsList.NewConfig` | [`KeyperSetHandler`] | keyper set |
//! | `CollatorConfigsList.NewConfig` | [`CollatorHandler`] | collator |
//!
//! Handlers are registered on the observer before it runs. An event of a
//! followed type without a handler is fatal so that a newly deployed event
//! is never dropped silently.

pub mod domain;
pub mod error;
pub mod handlers;
pub mod observer;
pub mod ports;

#[cfg(test)]
mod test_support;

pub use domain::cursor::{next_cursor, start_position};
pub use error::{ObserverError, ObserverResult};
pub use handlers::collator::CollatorHandler;
pub use handlers::keyper_set::KeyperSetHandler;
pub use handlers::retry_get_addrs;
pub use observer::ChainObserver;
pub use ports::inbound::{Effect, EventHandler};

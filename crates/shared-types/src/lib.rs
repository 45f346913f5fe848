//! # Shared Types Crate
//!
//! Primitive domain types used by every keyper crate.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: addresses, epoch ids and keyper sets are
//!   defined once and reused by storage, consensus and gossip code.
//! - **Cooperative Cancellation**: every loop listens on a [`Shutdown`].
//! - **No Hidden Globals**: time is an injected [`Clock`] capability so loops
//!   can be driven deterministically in tests.

pub mod clock;
pub mod entities;
pub mod errors;
pub mod shutdown;

pub use clock::{Clock, MockClock, SystemClock};
pub use entities::*;
pub use errors::*;
pub use shutdown::{Shutdown, ShutdownSignal};

//! Typed table access on [`Tx`](crate::Tx).
//!
//! One module per table group, mirroring who owns the rows:
//!
//! - `chain` - written by the chain observer
//! - `consensus` - written by the consensus driver
//! - `epoch` - written by the epoch-key handler
//! - `outbound` - the consensus message queue
//! - `schema` - meta rows and schema initialisation

pub mod chain;
pub mod consensus;
pub mod epoch;
pub mod outbound;
pub mod schema;

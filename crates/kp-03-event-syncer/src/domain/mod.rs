//! Domain layer: logs, ABI helpers, typed events, contract bindings and
//! deployment descriptors.

pub mod abi;
pub mod contracts;
pub mod deployment;
pub mod events;
pub mod log;

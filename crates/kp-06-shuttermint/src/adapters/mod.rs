//! Adapters for the outbound ports.

pub mod mock;
pub mod rpc;
pub mod sender;

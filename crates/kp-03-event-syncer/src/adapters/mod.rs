//! Adapters implementing [`EthereumClient`](crate::ports::outbound::EthereumClient).

pub mod jsonrpc;
pub mod mock;
pub mod rpc;

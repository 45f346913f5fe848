//! # KP-03 Event Syncer
//!
//! Turns L1 contract logs into an ordered stream of typed events.
//!
//! ## Algorithm
//!
//! 1. Read the head `H`; the page is `[from, min(from + PAGE_SIZE - 1, H - finality)]`.
//!    An empty page means "wait `POLL_INTERVAL` and look again".
//! 2. Query every registered event type for the page concurrently.
//! 3. Merge and sort by `(block_number, log_index)`.
//! 4. Emit the logs (skipping anything before the configured start position),
//!    then a terminator carrying the page's last block.
//!
//! ## Crate Structure
//!
//! - `domain/` - logs, ABI decoding, typed events, contract bindings, deployments
//! - `ports/outbound.rs` - the `EthereumClient` SPI
//! - `adapters/` - JSON-RPC client and an in-memory mock chain
//! - `syncer.rs` - the `EventSyncer` service

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod syncer;

pub use adapters::jsonrpc::{JsonRpcClient, JsonRpcError};
pub use adapters::mock::MockEthereumClient;
pub use adapters::rpc::RpcEthereumClient;
pub use domain::abi;
pub use domain::contracts::{AddrsSeq, ContractBinding, Contracts};
pub use domain::deployment::{Deployment, Deployments};
pub use domain::events::{
    AddrsSeqAdded, AddrsSeqAppended, CollatorConfigsListNewConfig, ContractEvent, EventKind,
    EventSyncUpdate, EventType, KeypersConfigsListNewConfig,
};
pub use domain::log::{FilterQuery, Log};
pub use error::{SyncerError, SyncerResult};
pub use ports::outbound::EthereumClient;
pub use syncer::{EventSyncer, SyncerConfig};

//! Outbound ports (SPI) of the event syncer.

use async_trait::async_trait;
use shared_types::{Address, BlockNumber, Hash};

use crate::domain::log::{FilterQuery, Log};
use crate::error::SyncerResult;

/// The subset of the L1 JSON-RPC surface the keyper uses.
#[async_trait]
pub trait EthereumClient: Send + Sync {
    /// Number of the latest block.
    async fn block_number(&self) -> SyncerResult<BlockNumber>;

    /// Logs matching `query`, in any order.
    async fn filter_logs(&self, query: &FilterQuery) -> SyncerResult<Vec<Log>>;

    /// Read-only contract call against the latest block.
    async fn call(&self, to: Address, data: Vec<u8>) -> SyncerResult<Vec<u8>>;

    /// Broadcast a signed, RLP-encoded transaction.
    async fn send_raw_transaction(&self, raw: Vec<u8>) -> SyncerResult<Hash>;

    async fn chain_id(&self) -> SyncerResult<u64>;
}

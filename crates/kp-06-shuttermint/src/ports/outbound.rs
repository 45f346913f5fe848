//! Outbound ports (SPI) of the shuttermint crate.

use std::fmt;

use async_trait::async_trait;

use crate::domain::events::AbciEvent;
use crate::domain::messages::Message;
use crate::error::{ClientResult, SenderResult};

/// Inclusive height range of a transaction search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxQuery {
    pub min_height: i64,
    pub max_height: i64,
}

impl TxQuery {
    pub fn contains(&self, height: i64) -> bool {
        height >= self.min_height && height <= self.max_height
    }
}

impl fmt::Display for TxQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tx.height >= {} and tx.height <= {}",
            self.min_height, self.max_height
        )
    }
}

/// A committed transaction and the events it emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResult {
    pub height: i64,
    pub index: u32,
    pub events: Vec<AbciEvent>,
}

/// One page of a transaction search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxSearchPage {
    pub txs: Vec<TxResult>,
    pub total_count: u64,
}

/// Result codes of a commit-wait broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BroadcastResult {
    pub check_tx_code: u32,
    pub check_tx_log: String,
    pub deliver_tx_code: u32,
    pub deliver_tx_log: String,
}

/// The subset of the BFT node RPC the keyper uses.
#[async_trait]
pub trait ShuttermintClient: Send + Sync {
    /// Height of the last block whose commit is known, `None` while the
    /// chain is empty.
    async fn last_committed_height(&self) -> ClientResult<Option<i64>>;

    /// Transactions matching `query`, ordered by height and index. Pages
    /// start at 1.
    async fn tx_search(
        &self,
        query: &TxQuery,
        page: u64,
        per_page: u64,
    ) -> ClientResult<TxSearchPage>;

    /// Submit a transaction and wait until it is committed.
    async fn broadcast_tx_commit(&self, tx: Vec<u8>) -> ClientResult<BroadcastResult>;

    async fn chain_id(&self) -> ClientResult<String>;
}

/// Delivers consensus messages to the chain.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, msg: &Message) -> SenderResult<()>;
}

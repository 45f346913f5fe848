//! Raw L1 logs and the filter used to fetch them.

use shared_types::{Address, BlockNumber, Hash};

/// A log entry as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<Hash>,
    pub data: Vec<u8>,
    pub block_number: BlockNumber,
    pub log_index: u64,
}

impl Log {
    /// First topic, the event signature hash for non-anonymous events.
    pub fn topic0(&self) -> Option<&Hash> {
        self.topics.first()
    }

    /// `(block_number, log_index)`, the total order of logs on L1.
    pub fn position(&self) -> (BlockNumber, u64) {
        (self.block_number, self.log_index)
    }
}

/// Logs of one event emitted by one contract within an inclusive block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterQuery {
    pub from_block: BlockNumber,
    pub to_block: BlockNumber,
    pub address: Address,
    pub topic0: Hash,
}

impl FilterQuery {
    pub fn matches(&self, log: &Log) -> bool {
        log.address == self.address
            && log.block_number >= self.from_block
            && log.block_number <= self.to_block
            && log.topic0() == Some(&self.topic0)
    }
}

//! In-memory L1 chain for tests.
//!
//! Holds a head block number, a list of logs and the address sets of any
//! number of `AddrsSeq` contracts. Failures can be injected per method.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_crypto::keccak256;
use shared_types::{Address, BlockNumber, Hash};

use crate::domain::abi;
use crate::domain::contracts::AddrsSeq;
use crate::domain::events::ContractEvent;
use crate::domain::log::{FilterQuery, Log};
use crate::error::{SyncerError, SyncerResult};
use crate::ports::outbound::EthereumClient;

#[derive(Debug, Default)]
struct MockChain {
    head: BlockNumber,
    chain_id: u64,
    logs: Vec<Log>,
    addr_sets: HashMap<Address, Vec<Vec<Address>>>,
    failing_block_number: u32,
    failing_filter_logs: u32,
    block_number_calls: u64,
    filter_queries: Vec<FilterQuery>,
    sent_transactions: Vec<Vec<u8>>,
}

#[derive(Debug)]
pub struct MockEthereumClient {
    state: Mutex<MockChain>,
}

impl Default for MockEthereumClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEthereumClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockChain {
                chain_id: 1337,
                ..Default::default()
            }),
        }
    }

    pub fn set_block_number(&self, head: BlockNumber) {
        self.state.lock().head = head;
    }

    pub fn add_log(&self, log: Log) {
        self.state.lock().logs.push(log);
    }

    /// Record `event` as emitted by `address` at `(block_number, log_index)`.
    pub fn emit(
        &self,
        address: Address,
        event: &ContractEvent,
        block_number: BlockNumber,
        log_index: u64,
    ) -> Log {
        let log = event.to_log(address, block_number, log_index);
        self.add_log(log.clone());
        log
    }

    /// Set the `n`-th address set of the `AddrsSeq` at `contract`, growing
    /// the sequence with empty sets if needed.
    pub fn set_addrs(&self, contract: Address, n: u64, addrs: Vec<Address>) {
        let mut state = self.state.lock();
        let sets = state.addr_sets.entry(contract).or_default();
        let n = n as usize;
        if sets.len() <= n {
            sets.resize(n + 1, Vec::new());
        }
        sets[n] = addrs;
    }

    /// Make the next `n` calls of `block_number` fail.
    pub fn fail_block_number(&self, n: u32) {
        self.state.lock().failing_block_number = n;
    }

    /// Make the next `n` calls of `filter_logs` fail.
    pub fn fail_filter_logs(&self, n: u32) {
        self.state.lock().failing_filter_logs = n;
    }

    pub fn block_number_calls(&self) -> u64 {
        self.state.lock().block_number_calls
    }

    pub fn filter_queries(&self) -> Vec<FilterQuery> {
        self.state.lock().filter_queries.clone()
    }

    pub fn sent_transactions(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent_transactions.clone()
    }

    fn answer_call(&self, to: Address, data: &[u8]) -> SyncerResult<Vec<u8>> {
        if data.len() < 4 {
            return Err(SyncerError::Call("calldata shorter than a selector".into()));
        }
        let (selector, args) = data.split_at(4);
        let state = self.state.lock();
        let empty = Vec::new();
        let sets = state.addr_sets.get(&to).unwrap_or(&empty);

        let nth = |n: u64| -> SyncerResult<&Vec<Address>> {
            sets.get(n as usize)
                .ok_or_else(|| SyncerError::Call(format!("execution reverted: no set {n}")))
        };

        if selector == abi::selector(AddrsSeq::COUNT) {
            Ok(abi::encode_u64(sets.len() as u64).to_vec())
        } else if selector == abi::selector(AddrsSeq::COUNT_NTH) {
            let n = abi::decode_u64(args, 0)?;
            Ok(abi::encode_u64(nth(n)?.len() as u64).to_vec())
        } else if selector == abi::selector(AddrsSeq::AT) {
            let n = abi::decode_u64(args, 0)?;
            let i = abi::decode_u64(args, 1)?;
            let addr = nth(n)?
                .get(i as usize)
                .ok_or_else(|| SyncerError::Call(format!("execution reverted: no index {i}")))?;
            Ok(abi::encode_address(addr).to_vec())
        } else {
            Err(SyncerError::Call(format!(
                "unknown selector 0x{}",
                hex::encode(selector)
            )))
        }
    }
}

#[async_trait]
impl EthereumClient for MockEthereumClient {
    async fn block_number(&self) -> SyncerResult<BlockNumber> {
        let mut state = self.state.lock();
        state.block_number_calls += 1;
        if state.failing_block_number > 0 {
            state.failing_block_number -= 1;
            return Err(SyncerError::Rpc("injected block_number failure".into()));
        }
        Ok(state.head)
    }

    async fn filter_logs(&self, query: &FilterQuery) -> SyncerResult<Vec<Log>> {
        let mut state = self.state.lock();
        state.filter_queries.push(query.clone());
        if state.failing_filter_logs > 0 {
            state.failing_filter_logs -= 1;
            return Err(SyncerError::Rpc("injected filter_logs failure".into()));
        }
        Ok(state
            .logs
            .iter()
            .filter(|log| query.matches(log))
            .cloned()
            .collect())
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> SyncerResult<Vec<u8>> {
        self.answer_call(to, &data)
    }

    async fn send_raw_transaction(&self, raw: Vec<u8>) -> SyncerResult<Hash> {
        let hash = keccak256(&raw);
        self.state.lock().sent_transactions.push(raw);
        Ok(hash)
    }

    async fn chain_id(&self) -> SyncerResult<u64> {
        Ok(self.state.lock().chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{AddrsSeqAppended, EventKind};

    #[tokio::test]
    async fn test_filter_returns_matching_logs() {
        let client = MockEthereumClient::new();
        let event = ContractEvent::AddrsSeqAppended(AddrsSeqAppended {
            n: 0,
            raw: Log {
                address: Address::ZERO,
                topics: vec![],
                data: vec![],
                block_number: 0,
                log_index: 0,
            },
        });
        client.emit(Address([1; 20]), &event, 5, 0);
        client.emit(Address([2; 20]), &event, 5, 1);
        client.emit(Address([1; 20]), &event, 9, 0);

        let logs = client
            .filter_logs(&FilterQuery {
                from_block: 0,
                to_block: 6,
                address: Address([1; 20]),
                topic0: EventKind::AddrsSeqAppended.topic(),
            })
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].position(), (5, 0));
        assert_eq!(client.filter_queries().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let client = MockEthereumClient::new();
        client.set_block_number(42);
        client.fail_block_number(2);
        assert!(client.block_number().await.is_err());
        assert!(client.block_number().await.is_err());
        assert_eq!(client.block_number().await.unwrap(), 42);
        assert_eq!(client.block_number_calls(), 3);
    }

    #[tokio::test]
    async fn test_unknown_selector_reverts() {
        let client = MockEthereumClient::new();
        let err = client
            .call(Address([1; 20]), abi::encode_call("owner()", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncerError::Call(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_set_reverts() {
        let client = MockEthereumClient::new();
        client.set_addrs(Address([1; 20]), 0, vec![Address([9; 20])]);
        let data = abi::encode_call(AddrsSeq::AT, &[0, 1]);
        assert!(client.call(Address([1; 20]), data).await.is_err());
    }
}

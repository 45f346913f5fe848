//! In-memory BFT chain for tests.
//!
//! Transactions are appended with the events they emitted; the chain head
//! follows the highest height unless set explicitly. Broadcasts are recorded
//! and answered from a queue of canned results (default: accepted).

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_crypto::EncryptionPublicKey;
use shared_types::Address;

use crate::domain::events::{
    AbciEvent, Accusation, Apology, BatchConfig, CheckIn, Event, PolyCommitment, PolyEval,
};
use crate::domain::messages::Message;
use crate::error::{ClientError, ClientResult};
use crate::ports::outbound::{BroadcastResult, ShuttermintClient, TxQuery, TxResult, TxSearchPage};

#[derive(Debug, Default)]
struct MockChain {
    head: Option<i64>,
    chain_id: String,
    txs: Vec<TxResult>,
    /// Added to every reported total count.
    total_count_skew: i64,
    failing_tx_search: u32,
    queries: Vec<(TxQuery, u64, u64)>,
    broadcasts: Vec<Vec<u8>>,
    broadcast_results: VecDeque<ClientResult<BroadcastResult>>,
}

#[derive(Debug)]
pub struct MockShuttermintClient {
    state: Mutex<MockChain>,
}

impl Default for MockShuttermintClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockShuttermintClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockChain {
                chain_id: "shutter-test".to_string(),
                ..Default::default()
            }),
        }
    }

    pub fn set_head(&self, height: i64) {
        self.state.lock().head = Some(height);
    }

    /// Append a transaction at `height` carrying `events`.
    pub fn add_tx(&self, height: i64, events: Vec<AbciEvent>) {
        let mut state = self.state.lock();
        let index = state.txs.iter().filter(|tx| tx.height == height).count() as u32;
        state.txs.push(TxResult {
            height,
            index,
            events,
        });
        state.txs.sort_by_key(|tx| (tx.height, tx.index));
        if state.head.map_or(true, |h| h < height) {
            state.head = Some(height);
        }
    }

    /// Append a transaction emitting a single typed event at its height.
    pub fn add_event(&self, event: &Event) {
        self.add_tx(event.height(), vec![event.to_abci()]);
    }

    /// Execute `msg` the way the shutter application would and append the
    /// resulting event. Messages that emit nothing are dropped.
    pub fn deliver(&self, sender: Address, height: i64, msg: &Message) {
        if let Some(event) = message_to_event(sender, height, msg) {
            self.add_event(&event);
        }
    }

    /// Misreport the total count of every search by `skew`.
    pub fn skew_total_count(&self, skew: i64) {
        self.state.lock().total_count_skew = skew;
    }

    pub fn fail_tx_search(&self, n: u32) {
        self.state.lock().failing_tx_search = n;
    }

    /// Answer the next broadcast with `result`.
    pub fn push_broadcast_result(&self, result: ClientResult<BroadcastResult>) {
        self.state.lock().broadcast_results.push_back(result);
    }

    pub fn queries(&self) -> Vec<(TxQuery, u64, u64)> {
        self.state.lock().queries.clone()
    }

    /// Raw payloads of every broadcast so far.
    pub fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.state.lock().broadcasts.clone()
    }
}

/// The event the shutter application emits for a delivered message.
///
/// Block-seen and DKG-result messages only update application state.
pub fn message_to_event(sender: Address, height: i64, msg: &Message) -> Option<Event> {
    let event = match msg.clone() {
        Message::BatchConfig {
            activation_block_number,
            keypers,
            threshold,
            keyper_config_index,
        } => Event::BatchConfig(BatchConfig {
            height,
            activation_block_number,
            threshold,
            keypers,
            config_index: keyper_config_index,
        }),
        Message::CheckIn {
            encryption_public_key,
            ..
        } => Event::CheckIn(CheckIn {
            height,
            sender,
            encryption_public_key: EncryptionPublicKey::from_slice(&encryption_public_key).ok()?,
        }),
        Message::PolyCommitment { eon, gammas } => Event::PolyCommitment(PolyCommitment {
            height,
            sender,
            eon,
            gammas,
        }),
        Message::PolyEval {
            eon,
            receivers,
            encrypted_evals,
        } => Event::PolyEval(PolyEval {
            height,
            sender,
            eon,
            receivers,
            encrypted_evals,
        }),
        Message::Accusation { eon, accused } => Event::Accusation(Accusation {
            height,
            sender,
            eon,
            accused,
        }),
        Message::Apology {
            eon,
            accusers,
            poly_evals,
        } => Event::Apology(Apology {
            height,
            sender,
            eon,
            accusers,
            poly_evals,
        }),
        Message::BlockSeen { .. } | Message::DkgResult { .. } => return None,
    };
    Some(event)
}

#[async_trait]
impl ShuttermintClient for MockShuttermintClient {
    async fn last_committed_height(&self) -> ClientResult<Option<i64>> {
        Ok(self.state.lock().head)
    }

    async fn tx_search(
        &self,
        query: &TxQuery,
        page: u64,
        per_page: u64,
    ) -> ClientResult<TxSearchPage> {
        let mut state = self.state.lock();
        state.queries.push((*query, page, per_page));
        if state.failing_tx_search > 0 {
            state.failing_tx_search -= 1;
            return Err(ClientError::Rpc("injected tx_search failure".into()));
        }
        if page == 0 || per_page == 0 {
            return Err(ClientError::Rpc("page and per_page must be positive".into()));
        }
        let matching: Vec<&TxResult> = state
            .txs
            .iter()
            .filter(|tx| query.contains(tx.height))
            .collect();
        let total = matching.len() as i64 + state.total_count_skew;
        let skip = ((page - 1) * per_page) as usize;
        Ok(TxSearchPage {
            txs: matching
                .into_iter()
                .skip(skip)
                .take(per_page as usize)
                .cloned()
                .collect(),
            total_count: total.max(0) as u64,
        })
    }

    async fn broadcast_tx_commit(&self, tx: Vec<u8>) -> ClientResult<BroadcastResult> {
        let mut state = self.state.lock();
        state.broadcasts.push(tx);
        state
            .broadcast_results
            .pop_front()
            .unwrap_or_else(|| Ok(BroadcastResult::default()))
    }

    async fn chain_id(&self) -> ClientResult<String> {
        Ok(self.state.lock().chain_id.clone())
    }
}

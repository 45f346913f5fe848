//! Row types stored in the tables.
//!
//! Rows are `bincode`-encoded; byte blobs produced by other crates (DKG
//! state, key shares) are stored opaquely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{Address, BlockNumber, EonIndex, EpochId, KeyperIndex};

// =============================================================================
// CHAIN OBSERVER
// =============================================================================

/// Position of the next L1 log the chain observer will apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SyncCursor {
    pub next_block: BlockNumber,
    pub next_log_index: u64,
}

impl SyncCursor {
    pub fn new(next_block: BlockNumber, next_log_index: u64) -> Self {
        Self {
            next_block,
            next_log_index,
        }
    }
}

/// Collator responsible for blocks starting at `activation_block`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollatorRow {
    pub activation_block: BlockNumber,
    pub collator: Address,
}

// =============================================================================
// CONSENSUS MIRROR
// =============================================================================

/// A keyper set as confirmed by the consensus chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfigRow {
    pub config_index: u64,
    /// Consensus height of the confirming event.
    pub height: i64,
    pub activation_block: BlockNumber,
    pub threshold: u64,
    pub keypers: Vec<Address>,
    pub started: bool,
}

impl BatchConfigRow {
    pub fn keyper_index(&self, address: &Address) -> Option<KeyperIndex> {
        self.keypers
            .iter()
            .position(|k| k == address)
            .map(|i| i as KeyperIndex)
    }

    pub fn is_keyper(&self, address: &Address) -> bool {
        self.keypers.contains(address)
    }
}

/// An eon announced by the consensus chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EonRow {
    pub eon: EonIndex,
    /// Consensus height the DKG phases are counted from.
    pub start_height: i64,
    pub activation_block: BlockNumber,
    pub config_index: u64,
}

/// Outcome of the DKG of one eon. Written exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkgResultRow {
    pub eon: EonIndex,
    pub success: bool,
    pub error: Option<String>,
    /// Serialized DKG result, empty on failure.
    pub pure_result: Vec<u8>,
}

/// Lifecycle of an eon, derived from its DKG result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EonStatus {
    Running,
    Succeeded,
    Failed(String),
}

impl EonStatus {
    pub fn from_result(result: Option<&DkgResultRow>) -> Self {
        match result {
            None => EonStatus::Running,
            Some(r) if r.success => EonStatus::Succeeded,
            Some(r) => EonStatus::Failed(r.error.clone().unwrap_or_default()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, EonStatus::Running)
    }
}

/// Eon public key waiting to be broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EonPublicKeyRow {
    pub eon: EonIndex,
    pub eon_public_key: Vec<u8>,
    pub activation_block: BlockNumber,
    pub config_index: u64,
    pub keypers: Vec<Address>,
}

/// Own polynomial evaluation waiting to be encrypted and sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolyEvalRow {
    pub eon: EonIndex,
    pub receiver: Address,
    pub eval: Vec<u8>,
}

/// Consensus chain sync position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuttermintSyncMeta {
    pub current_block: i64,
    pub last_committed_height: i64,
    pub sync_timestamp: DateTime<Utc>,
}

impl Default for ShuttermintSyncMeta {
    fn default() -> Self {
        Self {
            current_block: 0,
            last_committed_height: -1,
            sync_timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

// =============================================================================
// EPOCH KEYS
// =============================================================================

/// A decryption key share of one keyper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionKeyShareRow {
    pub eon: EonIndex,
    pub epoch_id: EpochId,
    pub keyper_index: KeyperIndex,
    pub share: Vec<u8>,
}

/// A decryption trigger that was acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionTriggerRow {
    pub eon: EonIndex,
    pub epoch_id: EpochId,
    pub block_number: BlockNumber,
}

// =============================================================================
// OUTBOUND QUEUE
// =============================================================================

/// A serialized consensus message waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: u64,
    pub description: String,
    pub msg: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

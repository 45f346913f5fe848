//! Table prefixes and key encoding.
//!
//! Every key is `<table prefix><components>`. Numeric components are
//! big-endian so that a prefix scan returns rows in numeric order.

use shared_types::{Address, EpochId};

/// Logical tables of the keyper database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    // Chain observer
    /// `co/cursor` -> SyncCursor
    SyncCursor,
    /// `co/ks/{index}` -> KeyperSet
    KeyperSet,
    /// `co/col/{activation_block}` -> CollatorRow
    Collator,

    // Consensus mirror
    /// `kp/bc/{config_index}` -> BatchConfigRow
    BatchConfig,
    /// `kp/eon/{eon}` -> EonRow
    Eon,
    /// `kp/dkg/{eon}` -> serialized PureDKG
    DkgState,
    /// `kp/dkgres/{eon}` -> DkgResultRow
    DkgResult,
    /// `kp/eonpk/{eon}` -> EonPublicKeyRow
    EonPublicKeyPending,
    /// `kp/enc/{address}` -> encryption public key bytes
    EncryptionKey,
    /// `kp/peval/{eon}{receiver}` -> PolyEvalRow
    PolyEvalPending,
    /// `kp/smsync` -> ShuttermintSyncMeta
    ShuttermintSync,

    // Epoch keys
    /// `kp/share/{eon}{epoch}{keyper_index}` -> share bytes
    DecryptionKeyShare,
    /// `kp/key/{eon}{epoch}` -> key bytes
    DecryptionKey,
    /// `kp/trig/{eon}{epoch}` -> DecryptionTriggerRow
    DecryptionTrigger,

    // Orchestration
    /// `kp/out/{id}` -> OutboundMessage
    OutboundMessage,
    /// `kp/outseq` -> u64
    OutboundSequence,
    /// `kp/meta/{key}` -> String
    Meta,
    /// `kp/lbs` -> u64
    LastBlockSeen,
    /// `kp/lbcs` -> u64
    LastBatchConfigSent,
}

impl Table {
    /// Byte prefix of this table.
    pub fn prefix(&self) -> &'static [u8] {
        match self {
            Table::SyncCursor => b"co/cursor",
            Table::KeyperSet => b"co/ks/",
            Table::Collator => b"co/col/",
            Table::BatchConfig => b"kp/bc/",
            Table::Eon => b"kp/eon/",
            Table::DkgState => b"kp/dkg/",
            Table::DkgResult => b"kp/dkgres/",
            Table::EonPublicKeyPending => b"kp/eonpk/",
            Table::EncryptionKey => b"kp/enc/",
            Table::PolyEvalPending => b"kp/peval/",
            Table::ShuttermintSync => b"kp/smsync",
            Table::DecryptionKeyShare => b"kp/share/",
            Table::DecryptionKey => b"kp/key/",
            Table::DecryptionTrigger => b"kp/trig/",
            Table::OutboundMessage => b"kp/out/",
            Table::OutboundSequence => b"kp/outseq",
            Table::Meta => b"kp/meta/",
            Table::LastBlockSeen => b"kp/lbs",
            Table::LastBatchConfigSent => b"kp/lbcs",
        }
    }

    /// Human readable table name for errors.
    pub fn name(&self) -> &'static str {
        match self {
            Table::SyncCursor => "sync_cursor",
            Table::KeyperSet => "keyper_set",
            Table::Collator => "collator",
            Table::BatchConfig => "batch_config",
            Table::Eon => "eon",
            Table::DkgState => "dkg_state",
            Table::DkgResult => "dkg_result",
            Table::EonPublicKeyPending => "eon_public_key_pending",
            Table::EncryptionKey => "encryption_key",
            Table::PolyEvalPending => "poly_eval_pending",
            Table::ShuttermintSync => "shuttermint_sync",
            Table::DecryptionKeyShare => "decryption_key_share",
            Table::DecryptionKey => "decryption_key",
            Table::DecryptionTrigger => "decryption_trigger",
            Table::OutboundMessage => "outbound_message",
            Table::OutboundSequence => "outbound_sequence",
            Table::Meta => "meta",
            Table::LastBlockSeen => "last_block_seen",
            Table::LastBatchConfigSent => "last_batch_config_sent",
        }
    }

    /// Start building a key in this table.
    pub fn key(&self) -> KeyBuilder {
        KeyBuilder(self.prefix().to_vec())
    }
}

/// Appends key components to a table prefix.
#[derive(Debug, Clone)]
pub struct KeyBuilder(Vec<u8>);

impl KeyBuilder {
    pub fn u64(mut self, n: u64) -> Self {
        self.0.extend_from_slice(&n.to_be_bytes());
        self
    }

    pub fn address(mut self, address: &Address) -> Self {
        self.0.extend_from_slice(address.as_bytes());
        self
    }

    pub fn epoch(mut self, epoch: &EpochId) -> Self {
        self.0.extend_from_slice(epoch.as_bytes());
        self
    }

    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.0
    }
}

/// Read a big-endian `u64` at `offset` of `key`.
pub(crate) fn read_u64(key: &[u8], offset: usize) -> Option<u64> {
    let raw: [u8; 8] = key.get(offset..offset + 8)?.try_into().ok()?;
    Some(u64::from_be_bytes(raw))
}

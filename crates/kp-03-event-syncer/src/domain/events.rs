//! # Typed Contract Events
//!
//! The keyper reacts to four L1 events. Each is a closed variant of
//! [`ContractEvent`] tagged by [`EventKind`]; the chain observer keys its
//! handler registry on the tag.
//!
//! | Kind | Signature |
//! |------|-----------|
//! | `KeypersConfigsListNewConfig` | `NewConfig(uint64,uint64,uint64,uint64)` |
//! | `CollatorConfigsListNewConfig` | `NewConfig(uint64,uint64,uint64)` |
//! | `AddrsSeqAppended` | `Appended(uint64)` |
//! | `AddrsSeqAdded` | `Added(uint64,uint64,address[])` |

use std::fmt;
use std::sync::Arc;

use shared_types::{Address, BlockNumber, Hash};

use crate::domain::abi;
use crate::domain::contracts::ContractBinding;
use crate::domain::log::Log;
use crate::error::{SyncerError, SyncerResult};

// =============================================================================
// EVENT KINDS
// =============================================================================

/// Tag of a [`ContractEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    KeypersConfigsListNewConfig,
    CollatorConfigsListNewConfig,
    AddrsSeqAppended,
    AddrsSeqAdded,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::KeypersConfigsListNewConfig,
        EventKind::CollatorConfigsListNewConfig,
        EventKind::AddrsSeqAppended,
        EventKind::AddrsSeqAdded,
    ];

    /// Event name as declared in the contract ABI.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::KeypersConfigsListNewConfig | EventKind::CollatorConfigsListNewConfig => {
                "NewConfig"
            }
            EventKind::AddrsSeqAppended => "Appended",
            EventKind::AddrsSeqAdded => "Added",
        }
    }

    /// Canonical Solidity signature.
    pub fn signature(&self) -> &'static str {
        match self {
            EventKind::KeypersConfigsListNewConfig => "NewConfig(uint64,uint64,uint64,uint64)",
            EventKind::CollatorConfigsListNewConfig => "NewConfig(uint64,uint64,uint64)",
            EventKind::AddrsSeqAppended => "Appended(uint64)",
            EventKind::AddrsSeqAdded => "Added(uint64,uint64,address[])",
        }
    }

    /// `topic0` of logs of this kind.
    pub fn topic(&self) -> Hash {
        abi::event_topic(self.signature())
    }

    /// Unpack `log` into the typed event.
    pub fn decode(&self, log: &Log) -> SyncerResult<ContractEvent> {
        let wrap = |e: SyncerError| SyncerError::Decode {
            event: self.type_name(),
            message: e.to_string(),
        };
        if log.topic0() != Some(&self.topic()) {
            return Err(SyncerError::Decode {
                event: self.type_name(),
                message: "topic0 does not match event signature".into(),
            });
        }
        let data = &log.data;
        let event = match self {
            EventKind::KeypersConfigsListNewConfig => {
                ContractEvent::KeypersConfigsListNewConfig(KeypersConfigsListNewConfig {
                    activation_block_number: abi::decode_u64(data, 0).map_err(wrap)?,
                    keyper_set_index: abi::decode_u64(data, 1).map_err(wrap)?,
                    keyper_config_index: abi::decode_u64(data, 2).map_err(wrap)?,
                    threshold: abi::decode_u64(data, 3).map_err(wrap)?,
                    raw: log.clone(),
                })
            }
            EventKind::CollatorConfigsListNewConfig => {
                ContractEvent::CollatorConfigsListNewConfig(CollatorConfigsListNewConfig {
                    activation_block_number: abi::decode_u64(data, 0).map_err(wrap)?,
                    collator_set_index: abi::decode_u64(data, 1).map_err(wrap)?,
                    collator_config_index: abi::decode_u64(data, 2).map_err(wrap)?,
                    raw: log.clone(),
                })
            }
            EventKind::AddrsSeqAppended => ContractEvent::AddrsSeqAppended(AddrsSeqAppended {
                n: abi::decode_u64(data, 0).map_err(wrap)?,
                raw: log.clone(),
            }),
            EventKind::AddrsSeqAdded => ContractEvent::AddrsSeqAdded(AddrsSeqAdded {
                n: abi::decode_u64(data, 0).map_err(wrap)?,
                i: abi::decode_u64(data, 1).map_err(wrap)?,
                new_addrs: abi::decode_address_array(data, 2).map_err(wrap)?,
                raw: log.clone(),
            }),
        };
        Ok(event)
    }

    /// Name of the Rust event type, used in logs and errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::KeypersConfigsListNewConfig => "KeypersConfigsListNewConfig",
            EventKind::CollatorConfigsListNewConfig => "CollatorConfigsListNewConfig",
            EventKind::AddrsSeqAppended => "AddrsSeqAppended",
            EventKind::AddrsSeqAdded => "AddrsSeqAdded",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

// =============================================================================
// EVENT PAYLOADS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypersConfigsListNewConfig {
    pub activation_block_number: u64,
    pub keyper_set_index: u64,
    pub keyper_config_index: u64,
    pub threshold: u64,
    pub raw: Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollatorConfigsListNewConfig {
    pub activation_block_number: u64,
    pub collator_set_index: u64,
    pub collator_config_index: u64,
    pub raw: Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrsSeqAppended {
    pub n: u64,
    pub raw: Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrsSeqAdded {
    pub n: u64,
    pub i: u64,
    pub new_addrs: Vec<Address>,
    pub raw: Log,
}

/// A decoded L1 event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractEvent {
    KeypersConfigsListNewConfig(KeypersConfigsListNewConfig),
    CollatorConfigsListNewConfig(CollatorConfigsListNewConfig),
    AddrsSeqAppended(AddrsSeqAppended),
    AddrsSeqAdded(AddrsSeqAdded),
}

impl ContractEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ContractEvent::KeypersConfigsListNewConfig(_) => EventKind::KeypersConfigsListNewConfig,
            ContractEvent::CollatorConfigsListNewConfig(_) => {
                EventKind::CollatorConfigsListNewConfig
            }
            ContractEvent::AddrsSeqAppended(_) => EventKind::AddrsSeqAppended,
            ContractEvent::AddrsSeqAdded(_) => EventKind::AddrsSeqAdded,
        }
    }

    /// The log the event was decoded from.
    pub fn raw(&self) -> &Log {
        match self {
            ContractEvent::KeypersConfigsListNewConfig(e) => &e.raw,
            ContractEvent::CollatorConfigsListNewConfig(e) => &e.raw,
            ContractEvent::AddrsSeqAppended(e) => &e.raw,
            ContractEvent::AddrsSeqAdded(e) => &e.raw,
        }
    }

    /// ABI-encoded log data of the event.
    pub fn encode_data(&self) -> Vec<u8> {
        let mut data = Vec::new();
        match self {
            ContractEvent::KeypersConfigsListNewConfig(e) => {
                for v in [
                    e.activation_block_number,
                    e.keyper_set_index,
                    e.keyper_config_index,
                    e.threshold,
                ] {
                    data.extend_from_slice(&abi::encode_u64(v));
                }
            }
            ContractEvent::CollatorConfigsListNewConfig(e) => {
                for v in [
                    e.activation_block_number,
                    e.collator_set_index,
                    e.collator_config_index,
                ] {
                    data.extend_from_slice(&abi::encode_u64(v));
                }
            }
            ContractEvent::AddrsSeqAppended(e) => data.extend_from_slice(&abi::encode_u64(e.n)),
            ContractEvent::AddrsSeqAdded(e) => {
                data.extend_from_slice(&abi::encode_u64(e.n));
                data.extend_from_slice(&abi::encode_u64(e.i));
                data.extend_from_slice(&abi::encode_u64(3 * abi::WORD as u64));
                data.extend_from_slice(&abi::encode_address_array(&e.new_addrs));
            }
        }
        data
    }

    /// A log carrying this event, as emitted by `address`.
    pub fn to_log(&self, address: Address, block_number: BlockNumber, log_index: u64) -> Log {
        Log {
            address,
            topics: vec![self.kind().topic()],
            data: self.encode_data(),
            block_number,
            log_index,
        }
    }
}

// =============================================================================
// SYNCER INPUT AND OUTPUT
// =============================================================================

/// One event of one contract the syncer is asked to follow.
#[derive(Clone)]
pub struct EventType {
    pub contract: Arc<ContractBinding>,
    pub kind: EventKind,
}

impl EventType {
    pub fn new(contract: Arc<ContractBinding>, kind: EventKind) -> Self {
        Self { contract, kind }
    }

    pub fn address(&self) -> Address {
        self.contract.address
    }

    /// Block the contract was deployed in; nothing before it needs scanning.
    pub fn deploy_block(&self) -> BlockNumber {
        self.contract.deploy_block
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventType")
            .field("contract", &self.contract.name)
            .field("address", &self.contract.address)
            .field("kind", &self.kind)
            .finish()
    }
}

/// An item produced by [`EventSyncer::next`](crate::EventSyncer::next).
///
/// `event == None` is a terminator: everything up to and including
/// `block_number` has been delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSyncUpdate {
    pub event: Option<ContractEvent>,
    pub block_number: BlockNumber,
    pub log_index: u64,
}

impl EventSyncUpdate {
    pub fn is_terminator(&self) -> bool {
        self.event.is_none()
    }

    /// The sync position right after this update.
    pub fn next_cursor(&self) -> (BlockNumber, u64) {
        if self.event.is_some() {
            (self.block_number, self.log_index + 1)
        } else {
            (self.block_number + 1, 0)
        }
    }
}

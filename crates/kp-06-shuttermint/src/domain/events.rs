//! # Consensus Chain Events
//!
//! The BFT application reports state changes as typed events with an
//! ordered list of string attributes. Encodings:
//!
//! | Value | Attribute encoding |
//! |-------|--------------------|
//! | integer | decimal |
//! | address list | comma-separated `0x` hex |
//! | byte sequence | comma-separated `0x` hex |
//! | bytes | `0x` hex |
//!
//! Attribute names and order are fixed per event type; anything else is
//! malformed.

use serde::{Deserialize, Serialize};
use shared_crypto::EncryptionPublicKey;
use shared_types::{Address, BlockNumber, EonIndex};

use crate::error::{DriverError, DriverResult};

pub const CHECK_IN: &str = "shutter.check-in";
pub const BATCH_CONFIG: &str = "shutter.batch-config";
pub const BATCH_CONFIG_STARTED: &str = "shutter.batch-config-started";
pub const EON_STARTED: &str = "shutter.eon-started";
pub const POLY_COMMITMENT: &str = "shutter.poly-commitment-registered";
pub const POLY_EVAL: &str = "shutter.poly-eval-registered";
pub const ACCUSATION: &str = "shutter.accusation-registered";
pub const APOLOGY: &str = "shutter.apology-registered";

/// Raw event as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbciEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

// =============================================================================
// TYPED EVENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckIn {
    pub height: i64,
    pub sender: Address,
    pub encryption_public_key: EncryptionPublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub height: i64,
    pub activation_block_number: BlockNumber,
    pub threshold: u64,
    pub keypers: Vec<Address>,
    pub config_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfigStarted {
    pub height: i64,
    pub config_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EonStarted {
    pub height: i64,
    pub eon: EonIndex,
    pub activation_block_number: BlockNumber,
    pub config_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolyCommitment {
    pub height: i64,
    pub sender: Address,
    pub eon: EonIndex,
    pub gammas: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolyEval {
    pub height: i64,
    pub sender: Address,
    pub eon: EonIndex,
    pub receivers: Vec<Address>,
    pub encrypted_evals: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accusation {
    pub height: i64,
    pub sender: Address,
    pub eon: EonIndex,
    pub accused: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apology {
    pub height: i64,
    pub sender: Address,
    pub eon: EonIndex,
    pub accusers: Vec<Address>,
    pub poly_evals: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    CheckIn(CheckIn),
    BatchConfig(BatchConfig),
    BatchConfigStarted(BatchConfigStarted),
    EonStarted(EonStarted),
    PolyCommitment(PolyCommitment),
    PolyEval(PolyEval),
    Accusation(Accusation),
    Apology(Apology),
}

impl Event {
    /// Decode a raw event emitted at `height`.
    pub fn from_abci(ev: &AbciEvent, height: i64) -> DriverResult<Event> {
        let attrs = Attributes::new(ev);
        let event = match ev.kind.as_str() {
            CHECK_IN => {
                attrs.expect(&["Sender", "EncryptionPublicKey"])?;
                let raw = decode_bytes(attrs.value(1))?;
                Event::CheckIn(CheckIn {
                    height,
                    sender: decode_address(attrs.value(0))?,
                    encryption_public_key: EncryptionPublicKey::from_slice(&raw)?,
                })
            }
            BATCH_CONFIG => {
                attrs.expect(&["ActivationBlockNumber", "Threshold", "Keypers", "ConfigIndex"])?;
                Event::BatchConfig(BatchConfig {
                    height,
                    activation_block_number: decode_u64(attrs.value(0))?,
                    threshold: decode_u64(attrs.value(1))?,
                    keypers: decode_addresses(attrs.value(2))?,
                    config_index: decode_u64(attrs.value(3))?,
                })
            }
            BATCH_CONFIG_STARTED => {
                attrs.expect(&["ConfigIndex"])?;
                Event::BatchConfigStarted(BatchConfigStarted {
                    height,
                    config_index: decode_u64(attrs.value(0))?,
                })
            }
            EON_STARTED => {
                attrs.expect(&["Eon", "ActivationBlockNumber", "ConfigIndex"])?;
                Event::EonStarted(EonStarted {
                    height,
                    eon: decode_u64(attrs.value(0))?,
                    activation_block_number: decode_u64(attrs.value(1))?,
                    config_index: decode_u64(attrs.value(2))?,
                })
            }
            POLY_COMMITMENT => {
                attrs.expect(&["Sender", "Eon", "Gammas"])?;
                Event::PolyCommitment(PolyCommitment {
                    height,
                    sender: decode_address(attrs.value(0))?,
                    eon: decode_u64(attrs.value(1))?,
                    gammas: decode_byte_sequence(attrs.value(2))?,
                })
            }
            POLY_EVAL => {
                attrs.expect(&["Sender", "Eon", "Receivers", "EncryptedEvals"])?;
                let receivers = decode_addresses(attrs.value(2))?;
                let encrypted_evals = decode_byte_sequence(attrs.value(3))?;
                if receivers.len() != encrypted_evals.len() {
                    return Err(DriverError::MalformedEvent(format!(
                        "{} receivers but {} evals",
                        receivers.len(),
                        encrypted_evals.len()
                    )));
                }
                Event::PolyEval(PolyEval {
                    height,
                    sender: decode_address(attrs.value(0))?,
                    eon: decode_u64(attrs.value(1))?,
                    receivers,
                    encrypted_evals,
                })
            }
            ACCUSATION => {
                attrs.expect(&["Sender", "Eon", "Accused"])?;
                Event::Accusation(Accusation {
                    height,
                    sender: decode_address(attrs.value(0))?,
                    eon: decode_u64(attrs.value(1))?,
                    accused: decode_addresses(attrs.value(2))?,
                })
            }
            APOLOGY => {
                attrs.expect(&["Sender", "Eon", "Accusers", "PolyEvals"])?;
                let accusers = decode_addresses(attrs.value(2))?;
                let poly_evals = decode_byte_sequence(attrs.value(3))?;
                if accusers.len() != poly_evals.len() {
                    return Err(DriverError::MalformedEvent(format!(
                        "{} accusers but {} evals",
                        accusers.len(),
                        poly_evals.len()
                    )));
                }
                Event::Apology(Apology {
                    height,
                    sender: decode_address(attrs.value(0))?,
                    eon: decode_u64(attrs.value(1))?,
                    accusers,
                    poly_evals,
                })
            }
            other => {
                return Err(DriverError::MalformedEvent(format!(
                    "cannot make event from type {other}"
                )))
            }
        };
        Ok(event)
    }

    /// Encode back into the node's representation. The height is not part
    /// of the event itself.
    pub fn to_abci(&self) -> AbciEvent {
        match self {
            Event::CheckIn(e) => abci(
                CHECK_IN,
                vec![
                    ("Sender", e.sender.to_hex()),
                    ("EncryptionPublicKey", encode_bytes(e.encryption_public_key.as_bytes())),
                ],
            ),
            Event::BatchConfig(e) => abci(
                BATCH_CONFIG,
                vec![
                    ("ActivationBlockNumber", e.activation_block_number.to_string()),
                    ("Threshold", e.threshold.to_string()),
                    ("Keypers", encode_addresses(&e.keypers)),
                    ("ConfigIndex", e.config_index.to_string()),
                ],
            ),
            Event::BatchConfigStarted(e) => abci(
                BATCH_CONFIG_STARTED,
                vec![("ConfigIndex", e.config_index.to_string())],
            ),
            Event::EonStarted(e) => abci(
                EON_STARTED,
                vec![
                    ("Eon", e.eon.to_string()),
                    ("ActivationBlockNumber", e.activation_block_number.to_string()),
                    ("ConfigIndex", e.config_index.to_string()),
                ],
            ),
            Event::PolyCommitment(e) => abci(
                POLY_COMMITMENT,
                vec![
                    ("Sender", e.sender.to_hex()),
                    ("Eon", e.eon.to_string()),
                    ("Gammas", encode_byte_sequence(&e.gammas)),
                ],
            ),
            Event::PolyEval(e) => abci(
                POLY_EVAL,
                vec![
                    ("Sender", e.sender.to_hex()),
                    ("Eon", e.eon.to_string()),
                    ("Receivers", encode_addresses(&e.receivers)),
                    ("EncryptedEvals", encode_byte_sequence(&e.encrypted_evals)),
                ],
            ),
            Event::Accusation(e) => abci(
                ACCUSATION,
                vec![
                    ("Sender", e.sender.to_hex()),
                    ("Eon", e.eon.to_string()),
                    ("Accused", encode_addresses(&e.accused)),
                ],
            ),
            Event::Apology(e) => abci(
                APOLOGY,
                vec![
                    ("Sender", e.sender.to_hex()),
                    ("Eon", e.eon.to_string()),
                    ("Accusers", encode_addresses(&e.accusers)),
                    ("PolyEvals", encode_byte_sequence(&e.poly_evals)),
                ],
            ),
        }
    }

    pub fn height(&self) -> i64 {
        match self {
            Event::CheckIn(e) => e.height,
            Event::BatchConfig(e) => e.height,
            Event::BatchConfigStarted(e) => e.height,
            Event::EonStarted(e) => e.height,
            Event::PolyCommitment(e) => e.height,
            Event::PolyEval(e) => e.height,
            Event::Accusation(e) => e.height,
            Event::Apology(e) => e.height,
        }
    }
}

// =============================================================================
// ATTRIBUTE CODEC
// =============================================================================

struct Attributes<'a> {
    event: &'a AbciEvent,
}

impl<'a> Attributes<'a> {
    fn new(event: &'a AbciEvent) -> Self {
        Self { event }
    }

    fn expect(&self, names: &[&str]) -> DriverResult<()> {
        let attrs = &self.event.attributes;
        if attrs.len() != names.len() {
            return Err(DriverError::MalformedEvent(format!(
                "{}: expected {} attributes, got {}",
                self.event.kind,
                names.len(),
                attrs.len()
            )));
        }
        for (attr, name) in attrs.iter().zip(names) {
            if attr.key != *name {
                return Err(DriverError::MalformedEvent(format!(
                    "{}: expected attribute {name}, got {}",
                    self.event.kind, attr.key
                )));
            }
        }
        Ok(())
    }

    /// Only valid after `expect` succeeded for at least `i + 1` names.
    fn value(&self, i: usize) -> &'a str {
        self.event
            .attributes
            .get(i)
            .map(|a| a.value.as_str())
            .unwrap_or_default()
    }
}

fn abci(kind: &str, attributes: Vec<(&str, String)>) -> AbciEvent {
    AbciEvent {
        kind: kind.to_string(),
        attributes: attributes
            .into_iter()
            .map(|(key, value)| EventAttribute {
                key: key.to_string(),
                value,
            })
            .collect(),
    }
}

fn decode_u64(s: &str) -> DriverResult<u64> {
    s.parse::<u64>()
        .map_err(|e| DriverError::MalformedEvent(format!("bad integer {s:?}: {e}")))
}

fn decode_address(s: &str) -> DriverResult<Address> {
    Address::from_hex(s)
        .map_err(|e| DriverError::MalformedEvent(format!("malformed address {s:?}: {e}")))
}

fn encode_addresses(addrs: &[Address]) -> String {
    addrs.iter().map(Address::to_hex).collect::<Vec<_>>().join(",")
}

fn decode_addresses(s: &str) -> DriverResult<Vec<Address>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split(',').map(decode_address).collect()
}

fn encode_bytes(b: &[u8]) -> String {
    format!("0x{}", hex::encode(b))
}

fn decode_bytes(s: &str) -> DriverResult<Vec<u8>> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| DriverError::MalformedEvent(format!("hex without 0x prefix: {s:?}")))?;
    hex::decode(digits).map_err(|e| DriverError::MalformedEvent(format!("bad hex {s:?}: {e}")))
}

fn encode_byte_sequence(v: &[Vec<u8>]) -> String {
    v.iter()
        .map(|b| encode_bytes(b))
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_byte_sequence(s: &str) -> DriverResult<Vec<Vec<u8>>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split(',').map(decode_bytes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::EncryptionKeyPair;

    #[test]
    fn test_batch_config_wire_format() {
        let event = Event::BatchConfig(BatchConfig {
            height: 12,
            activation_block_number: 200,
            threshold: 2,
            keypers: vec![Address([0xaa; 20]), Address([0xbb; 20])],
            config_index: 1,
        });
        let raw = event.to_abci();
        assert_eq!(raw.kind, BATCH_CONFIG);
        assert_eq!(raw.attributes[0].value, "200");
        assert_eq!(
            raw.attributes[2].value,
            format!("{},{}", Address([0xaa; 20]).to_hex(), Address([0xbb; 20]).to_hex())
        );
        assert_eq!(Event::from_abci(&raw, 12).unwrap(), event);
    }

    #[test]
    fn test_check_in_carries_encryption_key() {
        let key = EncryptionKeyPair::generate().public_key();
        let event = Event::CheckIn(CheckIn {
            height: 3,
            sender: Address([1; 20]),
            encryption_public_key: key,
        });
        let decoded = Event::from_abci(&event.to_abci(), 3).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_empty_lists_decode() {
        let event = Event::Accusation(Accusation {
            height: 9,
            sender: Address([1; 20]),
            eon: 4,
            accused: vec![],
        });
        let raw = event.to_abci();
        assert_eq!(raw.attributes[2].value, "");
        assert_eq!(Event::from_abci(&raw, 9).unwrap(), event);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let raw = abci("shutter.unknown", vec![]);
        let err = Event::from_abci(&raw, 1).unwrap_err();
        assert!(err.to_string().contains("shutter.unknown"));
    }

    #[test]
    fn test_attribute_order_is_enforced() {
        let raw = abci(
            EON_STARTED,
            vec![
                ("ActivationBlockNumber", "200".into()),
                ("Eon", "1".into()),
                ("ConfigIndex", "1".into()),
            ],
        );
        assert!(matches!(
            Event::from_abci(&raw, 1),
            Err(DriverError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_mismatched_eval_count_rejected() {
        let raw = abci(
            POLY_EVAL,
            vec![
                ("Sender", Address([1; 20]).to_hex()),
                ("Eon", "1".into()),
                ("Receivers", Address([2; 20]).to_hex()),
                ("EncryptedEvals", String::new()),
            ],
        );
        assert!(Event::from_abci(&raw, 1).is_err());
    }

    #[test]
    fn test_bad_values_rejected() {
        let raw = abci(BATCH_CONFIG_STARTED, vec![("ConfigIndex", "-1".into())]);
        assert!(Event::from_abci(&raw, 1).is_err());
        assert!(decode_bytes("abcd").is_err());
        assert!(decode_addresses("0x1234").is_err());
    }
}

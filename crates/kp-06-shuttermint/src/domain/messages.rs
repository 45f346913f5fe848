//! # Consensus Messages
//!
//! Messages this keyper submits to the BFT chain. They are queued as
//! bincode-encoded [`Message`] values and wrapped, signed and encoded only
//! when they are sent:
//!
//! ```text
//! signed tx = signature (65 bytes) || bincode(MessageWithNonce)
//! wire      = base64url-nopad(signed tx)
//! ```
//!
//! The signature is a recoverable secp256k1 signature over the Keccak-256
//! digest of the body, so the chain learns the sender's address from it.

use serde::{Deserialize, Serialize};
use shared_crypto::{keccak256, recover_address, RecoverableSignature, Secp256k1KeyPair};
use shared_types::{Address, BlockNumber, EonIndex};

use crate::error::{SenderError, SenderResult};

const SIGNATURE_LEN: usize = 65;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Propose a keyper set seen on L1.
    BatchConfig {
        activation_block_number: BlockNumber,
        keypers: Vec<Address>,
        threshold: u64,
        keyper_config_index: u64,
    },
    /// Heartbeat announcing the L1 block the keyper has reached.
    BlockSeen { block_number: BlockNumber },
    CheckIn {
        validator_public_key: Vec<u8>,
        encryption_public_key: Vec<u8>,
    },
    PolyEval {
        eon: EonIndex,
        receivers: Vec<Address>,
        encrypted_evals: Vec<Vec<u8>>,
    },
    PolyCommitment { eon: EonIndex, gammas: Vec<Vec<u8>> },
    Accusation { eon: EonIndex, accused: Vec<Address> },
    Apology {
        eon: EonIndex,
        accusers: Vec<Address>,
        poly_evals: Vec<Vec<u8>>,
    },
    DkgResult { eon: EonIndex, success: bool },
}

impl Message {
    /// Queue description. Used in logs and to find queued messages again.
    pub fn description(&self) -> String {
        match self {
            Message::BatchConfig {
                activation_block_number,
                keyper_config_index,
                ..
            } => batch_config_description(*activation_block_number, *keyper_config_index),
            Message::BlockSeen { block_number } => format!("block seen (block={block_number})"),
            Message::CheckIn {
                validator_public_key,
                ..
            } => format!(
                "check-in (validator-pub-key={})",
                hex::encode(validator_public_key)
            ),
            Message::PolyEval { eon, .. } => format!("poly eval (eon={eon})"),
            Message::PolyCommitment { eon, .. } => format!("poly commitment (eon={eon})"),
            Message::Accusation { eon, accused } => {
                format!("accusations (eon={eon}, count={})", accused.len())
            }
            Message::Apology { eon, accusers, .. } => {
                format!("apologies (eon={eon}, count={})", accusers.len())
            }
            Message::DkgResult { eon, .. } => format!("reporting DKG result (eon={eon})"),
        }
    }

    /// Short variant name, a low-cardinality metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::BatchConfig { .. } => "batch_config",
            Message::BlockSeen { .. } => "block_seen",
            Message::CheckIn { .. } => "check_in",
            Message::PolyEval { .. } => "poly_eval",
            Message::PolyCommitment { .. } => "poly_commitment",
            Message::Accusation { .. } => "accusation",
            Message::Apology { .. } => "apology",
            Message::DkgResult { .. } => "dkg_result",
        }
    }

    pub fn encode(&self) -> SenderResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| SenderError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> SenderResult<Self> {
        bincode::deserialize(bytes).map_err(|e| SenderError::Codec(e.to_string()))
    }
}

/// Description of the batch-config proposal for `(activation, config_index)`.
///
/// The reducer deletes a still-queued proposal by this description once the
/// chain has confirmed the config.
pub fn batch_config_description(activation_block: BlockNumber, config_index: u64) -> String {
    format!("new batch config (activation-block-number={activation_block}, config-index={config_index})")
}

/// A message bound to one chain and made unique by a random nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageWithNonce {
    pub msg: Message,
    pub chain_id: Vec<u8>,
    pub random_nonce: u64,
}

impl MessageWithNonce {
    pub fn new(msg: Message, chain_id: &str, random_nonce: u64) -> Self {
        Self {
            msg,
            chain_id: chain_id.as_bytes().to_vec(),
            random_nonce,
        }
    }

    /// Signature followed by the encoded body.
    pub fn sign(&self, key: &Secp256k1KeyPair) -> SenderResult<Vec<u8>> {
        let body = bincode::serialize(self).map_err(|e| SenderError::Codec(e.to_string()))?;
        let signature = key.sign_hash(&keccak256(&body))?;
        let mut signed = signature.to_vec();
        signed.extend_from_slice(&body);
        Ok(signed)
    }

    /// Inverse of [`MessageWithNonce::sign`]; returns the signer's address.
    pub fn open(signed: &[u8]) -> SenderResult<(Address, Self)> {
        if signed.len() < SIGNATURE_LEN {
            return Err(SenderError::Codec("signed message too short".into()));
        }
        let (signature, body) = signed.split_at(SIGNATURE_LEN);
        let signature = RecoverableSignature::from_slice(signature)?;
        let signer = recover_address(&keccak256(body), &signature)?;
        let msg = bincode::deserialize(body).map_err(|e| SenderError::Codec(e.to_string()))?;
        Ok((signer, msg))
    }
}

//! # P2P Messages
//!
//! The four gossip message kinds of the keyper network. Every message
//! carries the network's instance id so traffic of different deployments
//! never mixes.
//!
//! ## Wire format
//!
//! bincode of [`P2PMessage`]. The enum discriminant leads the encoding and
//! doubles as the topic tag.
//!
//! ## Signatures
//!
//! Triggers (signed by the collator) and eon public keys (signed by a
//! keyper) carry a recoverable ECDSA signature over a SHA3-256 digest of
//! their fields, each field in fixed-width big-endian form.

use std::fmt;

use serde::{Deserialize, Serialize};
use shared_crypto::{
    recover_address, sha3_256_concat, CryptoError, RecoverableSignature, Secp256k1KeyPair,
};
use shared_types::{Address, BlockNumber, EonIndex, EpochId, Hash, InstanceId, KeyperIndex};

use crate::error::{BusError, BusResult};

const TRIGGER_DOMAIN: &[u8] = b"shutter/decryption-trigger";
const EON_KEY_DOMAIN: &[u8] = b"shutter/eon-public-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    DecryptionTrigger,
    DecryptionKeyShare,
    DecryptionKey,
    EonPublicKey,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::DecryptionTrigger,
        Topic::DecryptionKeyShare,
        Topic::DecryptionKey,
        Topic::EonPublicKey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::DecryptionTrigger => "decryption-trigger",
            Topic::DecryptionKeyShare => "decryption-key-share",
            Topic::DecryptionKey => "decryption-key",
            Topic::EonPublicKey => "eon-public-key",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collator request to release the key of `epoch_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionTrigger {
    pub instance_id: InstanceId,
    pub epoch_id: EpochId,
    pub block_number: BlockNumber,
    pub signature: Vec<u8>,
}

impl DecryptionTrigger {
    /// Build and sign a trigger.
    pub fn signed(
        instance_id: InstanceId,
        epoch_id: EpochId,
        block_number: BlockNumber,
        key: &Secp256k1KeyPair,
    ) -> Result<Self, CryptoError> {
        let mut trigger = Self {
            instance_id,
            epoch_id,
            block_number,
            signature: Vec::new(),
        };
        trigger.signature = key.sign_hash(&trigger.signing_hash())?.to_vec();
        Ok(trigger)
    }

    pub fn signing_hash(&self) -> Hash {
        sha3_256_concat(&[
            TRIGGER_DOMAIN,
            &self.instance_id.to_be_bytes(),
            self.epoch_id.as_bytes(),
            &self.block_number.to_be_bytes(),
        ])
    }

    /// Address that signed the trigger.
    pub fn signer(&self) -> Result<Address, CryptoError> {
        let signature = RecoverableSignature::from_slice(&self.signature)?;
        recover_address(&self.signing_hash(), &signature)
    }
}

/// One keyper's share of an epoch key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionKeyShare {
    pub instance_id: InstanceId,
    pub eon: EonIndex,
    pub epoch_id: EpochId,
    pub keyper_index: KeyperIndex,
    pub share: Vec<u8>,
}

/// The assembled epoch key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionKey {
    pub instance_id: InstanceId,
    pub eon: EonIndex,
    pub epoch_id: EpochId,
    pub key: Vec<u8>,
}

/// A freshly generated eon public key, announced by each keyper of the set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EonPublicKey {
    pub instance_id: InstanceId,
    pub public_key: Vec<u8>,
    pub activation_block: BlockNumber,
    pub keyper_config_index: u64,
    pub eon: EonIndex,
    pub signature: Vec<u8>,
}

impl EonPublicKey {
    pub fn signing_hash(&self) -> Hash {
        sha3_256_concat(&[
            EON_KEY_DOMAIN,
            &self.instance_id.to_be_bytes(),
            &self.public_key,
            &self.activation_block.to_be_bytes(),
            &self.keyper_config_index.to_be_bytes(),
            &self.eon.to_be_bytes(),
        ])
    }

    pub fn sign(&mut self, key: &Secp256k1KeyPair) -> Result<(), CryptoError> {
        self.signature = key.sign_hash(&self.signing_hash())?.to_vec();
        Ok(())
    }

    pub fn signer(&self) -> Result<Address, CryptoError> {
        let signature = RecoverableSignature::from_slice(&self.signature)?;
        recover_address(&self.signing_hash(), &signature)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum P2PMessage {
    DecryptionTrigger(DecryptionTrigger),
    DecryptionKeyShare(DecryptionKeyShare),
    DecryptionKey(DecryptionKey),
    EonPublicKey(EonPublicKey),
}

impl P2PMessage {
    pub fn topic(&self) -> Topic {
        match self {
            P2PMessage::DecryptionTrigger(_) => Topic::DecryptionTrigger,
            P2PMessage::DecryptionKeyShare(_) => Topic::DecryptionKeyShare,
            P2PMessage::DecryptionKey(_) => Topic::DecryptionKey,
            P2PMessage::EonPublicKey(_) => Topic::EonPublicKey,
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        match self {
            P2PMessage::DecryptionTrigger(m) => m.instance_id,
            P2PMessage::DecryptionKeyShare(m) => m.instance_id,
            P2PMessage::DecryptionKey(m) => m.instance_id,
            P2PMessage::EonPublicKey(m) => m.instance_id,
        }
    }

    /// One-line summary for logs. Never includes key material.
    pub fn log_info(&self) -> String {
        match self {
            P2PMessage::DecryptionTrigger(m) => {
                format!("trigger(epoch={}, block={})", m.epoch_id, m.block_number)
            }
            P2PMessage::DecryptionKeyShare(m) => format!(
                "share(eon={}, epoch={}, keyper={})",
                m.eon, m.epoch_id, m.keyper_index
            ),
            P2PMessage::DecryptionKey(m) => format!("key(eon={}, epoch={})", m.eon, m.epoch_id),
            P2PMessage::EonPublicKey(m) => format!(
                "eon-public-key(eon={}, activation={}, config={})",
                m.eon, m.activation_block, m.keyper_config_index
            ),
        }
    }

    pub fn encode(&self) -> BusResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| BusError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> BusResult<Self> {
        bincode::deserialize(bytes).map_err(|e| BusError::Codec(e.to_string()))
    }
}

impl From<DecryptionTrigger> for P2PMessage {
    fn from(m: DecryptionTrigger) -> Self {
        P2PMessage::DecryptionTrigger(m)
    }
}

impl From<DecryptionKeyShare> for P2PMessage {
    fn from(m: DecryptionKeyShare) -> Self {
        P2PMessage::DecryptionKeyShare(m)
    }
}

impl From<DecryptionKey> for P2PMessage {
    fn from(m: DecryptionKey) -> Self {
        P2PMessage::DecryptionKey(m)
    }
}

impl From<EonPublicKey> for P2PMessage {
    fn from(m: EonPublicKey) -> Self {
        P2PMessage::EonPublicKey(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_signer_recovered() {
        let collator = Secp256k1KeyPair::generate();
        let trigger = DecryptionTrigger::signed(42, EpochId::from_u64(1), 210, &collator).unwrap();
        assert_eq!(trigger.signer().unwrap(), collator.address());

        let mut moved = trigger.clone();
        moved.block_number = 211;
        assert_ne!(moved.signer().ok(), Some(collator.address()));
    }

    #[test]
    fn test_eon_key_signature_covers_instance() {
        let keyper = Secp256k1KeyPair::generate();
        let mut msg = EonPublicKey {
            instance_id: 1,
            public_key: vec![7; 96],
            activation_block: 200,
            keyper_config_index: 1,
            eon: 7,
            signature: Vec::new(),
        };
        msg.sign(&keyper).unwrap();
        assert_eq!(msg.signer().unwrap(), keyper.address());

        msg.instance_id = 2;
        assert_ne!(msg.signer().ok(), Some(keyper.address()));
    }

    #[test]
    fn test_codec_and_topics() {
        let msg: P2PMessage = DecryptionKey {
            instance_id: 9,
            eon: 1,
            epoch_id: EpochId::from_u64(3),
            key: vec![1, 2, 3],
        }
        .into();
        let decoded = P2PMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.topic().as_str(), "decryption-key");
        assert_eq!(decoded.instance_id(), 9);
        assert!(P2PMessage::decode(&[9, 9]).is_err());
    }
}

//! # Ed25519 Validator Keys
//!
//! The BFT chain identifies validators by Ed25519 public keys. A keyper
//! announces its validator key in its check-in message; the key is only
//! carried, never used for signing by this node.

use ed25519_dalek::VerifyingKey;

use crate::CryptoError;

/// Ed25519 public key (32 bytes), validated on construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValidatorPublicKey([u8; 32]);

impl ValidatorPublicKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Parse hex, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let raw = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: raw.len(),
        })?;
        Self::from_bytes(bytes)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

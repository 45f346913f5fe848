//! # ECDSA Signatures (secp256k1, recoverable)
//!
//! Ethereum-style signatures over Keccak-256 digests. A signature is 65
//! bytes `r || s || v`; the signer is identified by the 20-byte address
//! recovered from it rather than by an explicit public key.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S normalization (EIP-2), high-S rejected on recovery
//! - Secret key bytes are zeroized on drop

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use shared_types::{Address, Hash};
use zeroize::Zeroize;

use crate::hashing::keccak256;
use crate::CryptoError;

/// A 65-byte recoverable signature `r || s || v` with `v` in `{0, 1}`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature([u8; 65]);

impl RecoverableSignature {
    /// Signature length in bytes.
    pub const LEN: usize = 65;

    /// Parse from 65 bytes. `v` may be `0, 1, 27` or `28`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 65] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureFormat)?;
        Ok(Self(arr))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// Owned copy of the raw bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    fn recovery_id(&self) -> Result<RecoveryId, CryptoError> {
        let v = self.0[64];
        let normalized = match v {
            0 | 1 => v,
            27 | 28 => v - 27,
            other => return Err(CryptoError::InvalidRecoveryId(other)),
        };
        RecoveryId::from_byte(normalized).ok_or(CryptoError::InvalidRecoveryId(v))
    }
}

impl std::fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecoverableSignature(0x{})", hex::encode(self.0))
    }
}

/// secp256k1 ECDSA keypair identifying this node.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Create from a hex-encoded secret key, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut raw = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let result = <[u8; 32]>::try_from(raw.as_slice())
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: 32,
                actual: raw.len(),
            })
            .and_then(Self::from_bytes);
        raw.zeroize();
        result
    }

    /// Ethereum address of this key.
    pub fn address(&self) -> Address {
        address_from_verifying_key(self.signing_key.verifying_key())
    }

    /// Public verifying key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Sign a 32-byte digest.
    pub fn sign_hash(&self, hash: &Hash) -> Result<RecoverableSignature, CryptoError> {
        let (sig, recid): (Signature, RecoveryId) = self
            .signing_key
            .sign_prehash_recoverable(hash)
            .map_err(|_| CryptoError::InvalidSignatureFormat)?;
        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&sig.to_bytes());
        bytes[64] = recid.to_byte();
        Ok(RecoverableSignature(bytes))
    }

    /// Keccak-256 the message, then sign the digest.
    pub fn sign_message(&self, message: &[u8]) -> Result<RecoverableSignature, CryptoError> {
        self.sign_hash(&keccak256(message))
    }

    /// Secret key bytes (for config serialization).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }

    /// Hex-encoded secret key without prefix.
    pub fn to_hex(&self) -> String {
        let mut bytes = self.to_bytes();
        let encoded = hex::encode(bytes);
        bytes.zeroize();
        encoded
    }
}

impl Clone for Secp256k1KeyPair {
    fn clone(&self) -> Self {
        Self {
            signing_key: self.signing_key.clone(),
        }
    }
}

impl std::fmt::Debug for Secp256k1KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secp256k1KeyPair({})", self.address())
    }
}

impl Drop for Secp256k1KeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

/// Recover the signer's Ethereum address from a signature over `hash`.
pub fn recover_address(hash: &Hash, signature: &RecoverableSignature) -> Result<Address, CryptoError> {
    let recovery_id = signature.recovery_id()?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes.copy_from_slice(&signature.0[..64]);
    let sig = Signature::from_slice(&sig_bytes);
    sig_bytes.zeroize();
    let sig = sig.map_err(|_| CryptoError::InvalidSignatureFormat)?;

    // EIP-2: reject high-S signatures
    if sig.normalize_s().is_some() {
        return Err(CryptoError::MalleableSignature);
    }

    let recovered_key = VerifyingKey::recover_from_prehash(hash, &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(address_from_verifying_key(&recovered_key))
}

/// Derive Ethereum address from public key.
pub fn address_from_verifying_key(public_key: &VerifyingKey) -> Address {
    let pubkey_bytes = public_key.to_encoded_point(false);
    let pubkey_slice = pubkey_bytes.as_bytes();

    // Keccak256 hash of public key (without 0x04 prefix)
    let hash = keccak256(&pubkey_slice[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Address(address)
}

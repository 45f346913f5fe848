//! # ECIES over secp256k1
//!
//! Point-to-point encryption of DKG polynomial evaluations. Each keyper
//! announces an [`EncryptionPublicKey`] in its check-in; dealers encrypt the
//! evaluation destined for keyper `j` under `j`'s key.
//!
//! Wire format: `ephemeral_pubkey (33) || nonce (24) || ciphertext`.
//! The AEAD key is `HKDF-SHA256(ikm = ECDH(eph, recipient), info = ephemeral_pubkey)`.

use hkdf::Hkdf;
use k256::ecdh::diffie_hellman;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey as K256SecretKey};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::symmetric::{self, Nonce, SecretKey};
use crate::CryptoError;

const HKDF_SALT: &[u8] = b"keyper-ecies-v1";
const PUBKEY_LEN: usize = 33;

/// Compressed SEC1 public key used as an encryption target.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncryptionPublicKey([u8; PUBKEY_LEN]);

impl EncryptionPublicKey {
    /// Parse compressed (33 bytes) or uncompressed (65 bytes) SEC1 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key = PublicKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self::from_public_key(&key))
    }

    fn from_public_key(key: &PublicKey) -> Self {
        let encoded = key.to_encoded_point(true);
        let mut bytes = [0u8; PUBKEY_LEN];
        bytes.copy_from_slice(encoded.as_bytes());
        Self(bytes)
    }

    fn to_public_key(self) -> Result<PublicKey, CryptoError> {
        PublicKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Compressed bytes.
    pub fn as_bytes(&self) -> &[u8; PUBKEY_LEN] {
        &self.0
    }

    /// Encrypt `plaintext` to the holder of this key.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let recipient = self.to_public_key()?;
        let ephemeral = K256SecretKey::random(&mut rand::thread_rng());
        let ephemeral_public = Self::from_public_key(&ephemeral.public_key());

        let shared = diffie_hellman(ephemeral.to_nonzero_scalar(), recipient.as_affine());
        let key = derive_key(shared.raw_secret_bytes().as_slice(), ephemeral_public.as_bytes())?;

        let (ciphertext, nonce) = symmetric::encrypt(&key, plaintext, ephemeral_public.as_bytes())?;

        let mut out = Vec::with_capacity(PUBKEY_LEN + Nonce::LEN + ciphertext.len());
        out.extend_from_slice(ephemeral_public.as_bytes());
        out.extend_from_slice(nonce.as_bytes());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }
}

impl std::fmt::Debug for EncryptionPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionPublicKey(0x{})", hex::encode(self.0))
    }
}

/// Secret half of the node's encryption key.
#[derive(Clone)]
pub struct EncryptionKeyPair {
    secret: K256SecretKey,
}

impl EncryptionKeyPair {
    /// Generate a random key.
    pub fn generate() -> Self {
        Self {
            secret: K256SecretKey::random(&mut rand::thread_rng()),
        }
    }

    /// Load from 32 secret bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let secret = K256SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { secret })
    }

    /// Load from hex, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut raw = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let result = Self::from_bytes(&raw);
        raw.zeroize();
        result
    }

    /// Hex-encoded secret without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.secret.to_bytes())
    }

    /// The public key peers encrypt to.
    pub fn public_key(&self) -> EncryptionPublicKey {
        EncryptionPublicKey::from_public_key(&self.secret.public_key())
    }

    /// Decrypt a message produced by [`EncryptionPublicKey::encrypt`].
    pub fn decrypt(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if message.len() < PUBKEY_LEN + Nonce::LEN {
            return Err(CryptoError::DecryptionFailed("message too short".to_string()));
        }
        let (ephemeral_bytes, rest) = message.split_at(PUBKEY_LEN);
        let (nonce_bytes, ciphertext) = rest.split_at(Nonce::LEN);

        let ephemeral = EncryptionPublicKey::from_slice(ephemeral_bytes)?.to_public_key()?;
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), ephemeral.as_affine());
        let key = derive_key(shared.raw_secret_bytes().as_slice(), ephemeral_bytes)?;

        let mut nonce = [0u8; 24];
        nonce.copy_from_slice(nonce_bytes);
        symmetric::decrypt(&key, ciphertext, &Nonce::from_bytes(nonce), ephemeral_bytes)
    }
}

impl std::fmt::Debug for EncryptionKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionKeyPair({:?})", self.public_key())
    }
}

fn derive_key(shared_secret: &[u8], info: &[u8]) -> Result<SecretKey, CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), shared_secret);
    let mut okm = [0u8; 32];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    let key = SecretKey::from_bytes(okm);
    okm.zeroize();
    Ok(key)
}

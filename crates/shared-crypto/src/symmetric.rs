//! # Symmetric Encryption
//!
//! XChaCha20-Poly1305 AEAD. Used by [`crate::ecies`] after key agreement.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use zeroize::Zeroize;

use crate::CryptoError;

/// Secret key (256-bit).
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// 192-bit XChaCha20 nonce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nonce([u8; 24]);

impl Nonce {
    /// Nonce length in bytes.
    pub const LEN: usize = 24;

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 24]) -> Self {
        Self(bytes)
    }

    /// Generate a random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 24];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; 24] {
        &self.0
    }
}

/// Encrypt `plaintext` bound to `aad` under a fresh random nonce.
pub fn encrypt(key: &SecretKey, plaintext: &[u8], aad: &[u8]) -> Result<(Vec<u8>, Nonce), CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let nonce = Nonce::generate();

    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok((ciphertext, nonce))
}

/// Decrypt and authenticate `ciphertext` against `aad`.
pub fn decrypt(
    key: &SecretKey,
    ciphertext: &[u8],
    nonce: &Nonce,
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    cipher
        .decrypt(
            XNonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let key = SecretKey::generate();
        let (ciphertext, nonce) = encrypt(&key, b"poly eval", b"eon-1").unwrap();
        assert_eq!(decrypt(&key, &ciphertext, &nonce, b"eon-1").unwrap(), b"poly eval");
    }

    #[test]
    fn test_wrong_aad_fails() {
        let key = SecretKey::generate();
        let (ciphertext, nonce) = encrypt(&key, b"poly eval", b"eon-1").unwrap();
        assert!(decrypt(&key, &ciphertext, &nonce, b"eon-2").is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = SecretKey::generate();
        let (mut ciphertext, nonce) = encrypt(&key, b"Secret message", &[]).unwrap();
        ciphertext[0] ^= 0xFF;

        assert!(decrypt(&key, &ciphertext, &nonce, &[]).is_err());
    }
}

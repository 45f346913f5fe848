//! # Shared Crypto - Keyper Cryptographic Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | Keccak-256, SHA3-256 | Message digests, address derivation |
//! | `ecdsa` | secp256k1 (recoverable) | Node identity, trigger and eon-key signatures |
//! | `ecies` | secp256k1 ECDH + HKDF-SHA256 + XChaCha20-Poly1305 | Encrypted DKG poly-evals |
//! | `symmetric` | XChaCha20-Poly1305 | AEAD used by `ecies` |
//! | `signatures` | Ed25519 | BFT validator public keys |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic, low-S normalization (EIP-2),
//!   Ethereum `v` in `{0, 1, 27, 28}` accepted on recovery
//! - **XChaCha20**: 192-bit random nonce

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod ecies;
pub mod errors;
pub mod hashing;
pub mod signatures;
pub mod symmetric;

// Re-exports
pub use ecdsa::{address_from_verifying_key, recover_address, RecoverableSignature, Secp256k1KeyPair};
pub use ecies::{EncryptionKeyPair, EncryptionPublicKey};
pub use errors::CryptoError;
pub use hashing::{keccak256, keccak256_concat, sha3_256_concat};
pub use signatures::ValidatorPublicKey;
pub use symmetric::{decrypt, encrypt, Nonce, SecretKey};

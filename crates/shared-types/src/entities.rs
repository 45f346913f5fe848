//! # Core Domain Entities
//!
//! Defines the primitive entities the keyper works with.
//!
//! ## Clusters
//!
//! - **Identity**: `Address`, `InstanceId`, `KeyperIndex`
//! - **Time**: `BlockNumber`, `EpochId`, `EonIndex`
//! - **Committee**: `KeyperSet`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::TypesError;

// Re-export U256 from primitive-types for ABI decoding across crates
pub use primitive_types::U256;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A 32-byte hash (Keccak-256 unless stated otherwise).
pub type Hash = [u8; 32];

/// L1 block number.
pub type BlockNumber = u64;

/// Index of an eon (one DKG run).
pub type EonIndex = u64;

/// Position of a keyper inside its keyper set.
pub type KeyperIndex = u64;

/// Network partition identifier carried by every gossip and consensus message.
pub type InstanceId = u64;

/// A 20-byte Ethereum-style address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Length of an address in bytes.
    pub const LEN: usize = 20;

    /// The zero address.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Build from a byte slice of exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
        let arr: [u8; 20] = bytes.try_into().map_err(|_| TypesError::InvalidLength {
            kind: "address",
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parse a `0x`-prefixed (or bare) hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        let raw = hex::decode(strip_0x(s)).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
        Self::from_slice(&raw)
    }

    /// Lowercase `0x`-prefixed hex encoding.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

// =============================================================================
// CLUSTER B: TIME
// =============================================================================

/// A 32-byte epoch identifier.
///
/// Epoch ids compare as big-endian unsigned integers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct EpochId(pub [u8; 32]);

impl EpochId {
    /// Length of an epoch id in bytes.
    pub const LEN: usize = 32;

    /// Epoch id holding `n` in its low-order bytes.
    pub fn from_u64(n: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    /// Build from exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| TypesError::InvalidLength {
            kind: "epoch id",
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parse hex. Shorter inputs are left-padded with zeros.
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        let raw = hex::decode(strip_0x(s)).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
        if raw.len() > Self::LEN {
            return Err(TypesError::InvalidLength {
                kind: "epoch id",
                expected: Self::LEN,
                actual: raw.len(),
            });
        }
        let mut bytes = [0u8; 32];
        bytes[32 - raw.len()..].copy_from_slice(&raw);
        Ok(Self(bytes))
    }

    /// Epoch id as a `U256`.
    pub fn to_u256(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }

    /// Low 64 bits, errors if the id does not fit.
    pub fn to_u64(&self) -> Result<u64, TypesError> {
        if self.0[..24].iter().any(|b| *b != 0) {
            return Err(TypesError::OutOfRange(self.to_hex()));
        }
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.0[24..]);
        Ok(u64::from_be_bytes(low))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full `0x`-prefixed hex encoding.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for EpochId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = hex::encode(self.0);
        write!(f, "{}..{}", &h[..4], &h[h.len() - 4..])
    }
}

impl fmt::Debug for EpochId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EpochId({})", self.to_hex())
    }
}

impl FromStr for EpochId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// =============================================================================
// CLUSTER C: COMMITTEE
// =============================================================================

/// An ordered keyper committee with its threshold.
///
/// Identified by a monotonically increasing `index`. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyperSet {
    /// Config index assigned by the keyper-configs contract.
    pub index: u64,
    /// First L1 block the set is responsible for.
    pub activation_block: BlockNumber,
    /// Ordered keyper addresses.
    pub keypers: Vec<Address>,
    /// Number of shares needed to reconstruct a key.
    pub threshold: u64,
}

impl KeyperSet {
    /// Position of `address` in the set, if present.
    pub fn keyper_index(&self, address: &Address) -> Option<KeyperIndex> {
        self.keypers
            .iter()
            .position(|k| k == address)
            .map(|i| i as KeyperIndex)
    }

    /// Whether `address` is part of the set.
    pub fn contains(&self, address: &Address) -> bool {
        self.keypers.contains(address)
    }

    /// Number of keypers.
    pub fn len(&self) -> usize {
        self.keypers.len()
    }

    /// True if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.keypers.is_empty()
    }

    /// A usable set has `1 <= threshold <= len`.
    pub fn is_valid(&self) -> bool {
        self.threshold >= 1 && (self.threshold as usize) <= self.keypers.len()
    }
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

//! Minimal Solidity ABI helpers.
//!
//! Only the shapes the keyper contracts use are supported: `uint64`,
//! `address` and dynamic `address[]` in head/tail encoding.

use shared_crypto::keccak256;
use shared_types::{Address, Hash};

use crate::error::{SyncerError, SyncerResult};

/// Size of one ABI word.
pub const WORD: usize = 32;

/// `keccak256(signature)`, the `topic0` of an event.
pub fn event_topic(signature: &str) -> Hash {
    keccak256(signature.as_bytes())
}

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Calldata for a function taking only `uint64` arguments.
pub fn encode_call(signature: &str, args: &[u64]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + args.len() * WORD);
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(&encode_u64(*arg));
    }
    data
}

pub fn encode_u64(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn encode_address(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

/// Tail encoding of an `address[]`: length word followed by one word per
/// element. The caller writes the offset word in the head.
pub fn encode_address_array(addresses: &[Address]) -> Vec<u8> {
    let mut out = Vec::with_capacity((addresses.len() + 1) * WORD);
    out.extend_from_slice(&encode_u64(addresses.len() as u64));
    for address in addresses {
        out.extend_from_slice(&encode_address(address));
    }
    out
}

/// The `index`-th word of `data`.
pub fn word(data: &[u8], index: usize) -> SyncerResult<&[u8]> {
    let start = index
        .checked_mul(WORD)
        .ok_or_else(|| SyncerError::Abi("word index overflow".into()))?;
    data.get(start..start + WORD).ok_or_else(|| {
        SyncerError::Abi(format!(
            "data too short: need word {index}, have {} bytes",
            data.len()
        ))
    })
}

fn u64_from_word(w: &[u8]) -> SyncerResult<u64> {
    if w[..24].iter().any(|b| *b != 0) {
        return Err(SyncerError::Abi("value does not fit into uint64".into()));
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&w[24..]);
    Ok(u64::from_be_bytes(low))
}

pub fn decode_u64(data: &[u8], index: usize) -> SyncerResult<u64> {
    u64_from_word(word(data, index)?)
}

pub fn decode_address(data: &[u8], index: usize) -> SyncerResult<Address> {
    address_from_word(word(data, index)?)
}

fn address_from_word(w: &[u8]) -> SyncerResult<Address> {
    if w[..12].iter().any(|b| *b != 0) {
        return Err(SyncerError::Abi("dirty address padding".into()));
    }
    Address::from_slice(&w[12..]).map_err(|e| SyncerError::Abi(e.to_string()))
}

/// Decode the `address[]` whose offset sits in head word `index`.
pub fn decode_address_array(data: &[u8], index: usize) -> SyncerResult<Vec<Address>> {
    let offset = usize::try_from(decode_u64(data, index)?)
        .map_err(|_| SyncerError::Abi("array offset overflow".into()))?;
    if offset % WORD != 0 {
        return Err(SyncerError::Abi(format!("unaligned array offset {offset}")));
    }
    let base = offset / WORD;
    let len = usize::try_from(decode_u64(data, base)?)
        .map_err(|_| SyncerError::Abi("array length overflow".into()))?;
    let needed = (base + 1 + len) * WORD;
    if data.len() < needed {
        return Err(SyncerError::Abi(format!(
            "array of {len} elements truncated: need {needed} bytes, have {}",
            data.len()
        )));
    }
    (0..len).map(|i| decode_address(data, base + 1 + i)).collect()
}

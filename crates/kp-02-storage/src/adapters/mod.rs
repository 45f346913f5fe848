//! Key-value store implementations.

pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;

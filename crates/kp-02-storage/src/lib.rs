//! # KP-02 Storage
//!
//! Durable state of the keyper: the chain-observer tables filled from L1
//! events and the keyper tables filled from the consensus chain.
//!
//! ## Transaction Model
//!
//! All access goes through a [`Tx`] obtained from the shared [`Database`].
//! A transaction buffers its writes in an overlay (reads see their own
//! writes) and applies them with one atomic batch on [`Tx::commit`].
//! Dropping a transaction without committing rolls it back.
//!
//! Transactions are serialised: `begin` waits for the previous transaction to
//! finish. This gives every "step" (one event, one block tick, one trigger)
//! serialisable isolation, which makes conditional inserts race-free.
//! A transaction must not be held across network I/O: fetch first, then
//! begin.
//!
//! Pure readers (HTTP handlers, metrics, cursor lookups) use
//! [`Database::read`], a view of committed state that never waits for the
//! running transaction.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - table prefixes, key encoding, row types
//! - `ports/` - the `KeyValueStore` SPI
//! - `adapters/` - in-memory and RocksDB stores
//! - `database.rs` - `Database` pool and `Tx`
//! - `queries/` - typed table access on `Tx`

pub mod adapters;
pub mod database;
pub mod domain;
pub mod error;
pub mod ports;
pub mod queries;

pub use adapters::memory::InMemoryKVStore;
#[cfg(feature = "rocksdb")]
pub use adapters::rocksdb::{RocksDbConfig, RocksDbStore};
pub use database::{Database, Savepoint, Tx};
pub use domain::rows::*;
pub use domain::tables::Table;
pub use error::{StorageError, StorageResult};
pub use ports::outbound::{BatchOperation, KeyValueStore, ScanResult};
pub use queries::schema::SCHEMA_VERSION;

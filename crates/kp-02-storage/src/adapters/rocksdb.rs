//! # RocksDB Storage Adapter
//!
//! Production implementation of the KeyValueStore trait.
//!
//! ## Features
//!
//! - Atomic batch writes (WriteBatch)
//! - Snappy compression
//! - Bloom filters for point lookups
//! - fsync on write for durability

use std::path::Path;

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, WriteOptions, DB};

use crate::error::StorageError;
use crate::ports::outbound::{BatchOperation, KeyValueStore, ScanResult};

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: String,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// Enable fsync after each write (default: true)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/keyper".to_string(),
            block_cache_size: 64 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Create config for testing (small buffers, no sync)
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 4 * 1024 * 1024,
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed key-value store.
pub struct RocksDbStore {
    db: DB,
    config: RocksDbConfig,
}

impl RocksDbStore {
    /// Open or create a database.
    pub fn open(config: RocksDbConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path)
            .map_err(|e| StorageError::Backend(format!("failed to open RocksDB: {e}")))?;

        Ok(Self { db, config })
    }

    /// Open at `path` with default tuning.
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open(RocksDbConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        })
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.db
            .get(key)
            .map_err(|e| StorageError::Backend(format!("RocksDB get failed: {e}")))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db
            .put_opt(key, value, &self.write_options())
            .map_err(|e| StorageError::Backend(format!("RocksDB put failed: {e}")))
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StorageError> {
        self.db
            .delete_opt(key, &self.write_options())
            .map_err(|e| StorageError::Backend(format!("RocksDB delete failed: {e}")))
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put(&key, &value),
                BatchOperation::Delete { key } => batch.delete(&key),
            }
        }
        self.db
            .write_opt(batch, &self.write_options())
            .map_err(|e| StorageError::Backend(format!("RocksDB batch write failed: {e}")))
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        self.db
            .get_pinned(key)
            .map(|v| v.is_some())
            .map_err(|e| StorageError::Backend(format!("RocksDB exists check failed: {e}")))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, StorageError> {
        let mut results = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, value) =
                item.map_err(|e| StorageError::Backend(format!("RocksDB scan failed: {e}")))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();

        {
            let mut store = RocksDbStore::open(RocksDbConfig::for_testing(path.clone())).unwrap();
            store
                .atomic_batch_write(vec![
                    BatchOperation::put(b"t/1".to_vec(), b"a".to_vec()),
                    BatchOperation::put(b"t/2".to_vec(), b"b".to_vec()),
                ])
                .unwrap();
        }

        let store = RocksDbStore::open(RocksDbConfig::for_testing(path)).unwrap();
        let rows = store.prefix_scan(b"t/").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1, b"a".to_vec());
    }
}

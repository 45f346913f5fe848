//! Database pool and transactions.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use crate::adapters::memory::InMemoryKVStore;
use crate::domain::tables::Table;
use crate::error::{StorageError, StorageResult};
use crate::ports::outbound::{BatchOperation, KeyValueStore, ScanResult};

type SharedStore = Arc<RwLock<Box<dyn KeyValueStore>>>;

/// Shared handle to the keyper database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    store: SharedStore,
    writer: Arc<Mutex<()>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Wrap a key-value store.
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Arc::new(RwLock::new(Box::new(store))),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Fresh in-memory database.
    pub fn in_memory() -> Self {
        Self::new(InMemoryKVStore::new())
    }

    /// Begin a transaction, waiting for the running one to finish.
    pub async fn begin(&self) -> Tx {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        Tx {
            store: Arc::clone(&self.store),
            overlay: BTreeMap::new(),
            guard: Some(guard),
        }
    }

    /// Read-only view of committed state that never waits for the writer.
    ///
    /// Every read sees the latest commit, so two reads may straddle a
    /// concurrent commit. Use [`Database::begin`] when reads must agree or
    /// feed a write. Committing writes made through the view fails with
    /// [`StorageError::ReadOnly`].
    pub fn read(&self) -> Tx {
        Tx {
            store: Arc::clone(&self.store),
            overlay: BTreeMap::new(),
            guard: None,
        }
    }
}

/// Snapshot of a transaction's buffered writes.
#[derive(Debug, Clone)]
pub struct Savepoint(BTreeMap<Vec<u8>, Option<Vec<u8>>>);

/// A serialisable transaction.
///
/// Writes are buffered until [`Tx::commit`]. Dropping the transaction
/// discards them.
pub struct Tx {
    store: SharedStore,
    overlay: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Tx {
    /// Apply all buffered writes atomically.
    pub fn commit(self) -> StorageResult<()> {
        if self.overlay.is_empty() {
            return Ok(());
        }
        if self.guard.is_none() {
            return Err(StorageError::ReadOnly(self.overlay.len()));
        }
        let ops: Vec<BatchOperation> = self
            .overlay
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => BatchOperation::Put { key, value },
                None => BatchOperation::Delete { key },
            })
            .collect();
        trace!(ops = ops.len(), "committing transaction");
        self.store.write().atomic_batch_write(ops)
    }

    /// Discard all buffered writes.
    pub fn rollback(self) {}

    /// Remember the current buffered writes.
    pub fn savepoint(&self) -> Savepoint {
        Savepoint(self.overlay.clone())
    }

    /// Forget every write made after `savepoint` was taken.
    pub fn rollback_to(&mut self, savepoint: Savepoint) {
        self.overlay = savepoint.0;
    }

    /// False for views obtained from [`Database::read`].
    pub fn is_writable(&self) -> bool {
        self.guard.is_some()
    }

    /// Number of buffered writes.
    pub fn pending_writes(&self) -> usize {
        self.overlay.len()
    }

    // =========================================================================
    // RAW ACCESS
    // =========================================================================

    pub fn get_raw(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        match self.overlay.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.store.read().get(key),
        }
    }

    pub fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.overlay.insert(key, Some(value));
    }

    pub fn delete_raw(&mut self, key: Vec<u8>) {
        self.overlay.insert(key, None);
    }

    pub fn exists_raw(&self, key: &[u8]) -> StorageResult<bool> {
        match self.overlay.get(key) {
            Some(value) => Ok(value.is_some()),
            None => self.store.read().exists(key),
        }
    }

    /// Prefix scan merging committed rows with this transaction's writes.
    pub fn scan_raw(&self, prefix: &[u8]) -> StorageResult<ScanResult> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.store.read().prefix_scan(prefix)?.into_iter().collect();
        for (key, value) in self
            .overlay
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    // =========================================================================
    // TYPED ROWS
    // =========================================================================

    pub(crate) fn get_row<T: DeserializeOwned>(
        &self,
        table: Table,
        key: &[u8],
    ) -> StorageResult<Option<T>> {
        self.get_raw(key)?
            .map(|raw| decode(table, &raw))
            .transpose()
    }

    pub(crate) fn put_row<T: Serialize>(
        &mut self,
        table: Table,
        key: Vec<u8>,
        row: &T,
    ) -> StorageResult<()> {
        let raw = encode(table, row)?;
        self.put_raw(key, raw);
        Ok(())
    }

    pub(crate) fn scan_rows<T: DeserializeOwned>(
        &self,
        table: Table,
        prefix: &[u8],
    ) -> StorageResult<Vec<(Vec<u8>, T)>> {
        self.scan_raw(prefix)?
            .into_iter()
            .map(|(k, v)| decode(table, &v).map(|row| (k, row)))
            .collect()
    }
}

pub(crate) fn encode<T: Serialize>(table: Table, row: &T) -> StorageResult<Vec<u8>> {
    bincode::serialize(row).map_err(|e| StorageError::Codec {
        table: table.name(),
        message: e.to_string(),
    })
}

pub(crate) fn decode<T: DeserializeOwned>(table: Table, raw: &[u8]) -> StorageResult<T> {
    bincode::deserialize(raw).map_err(|e| StorageError::Codec {
        table: table.name(),
        message: e.to_string(),
    })
}

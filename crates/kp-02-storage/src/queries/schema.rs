//! Meta rows and schema initialisation.

use crate::database::{Database, Tx};
use crate::domain::tables::Table;
use crate::error::{StorageError, StorageResult};

/// Version of the table layout written by this crate.
pub const SCHEMA_VERSION: &str = "keyper-1";

const SCHEMA_VERSION_KEY: &str = "schema version";

impl Tx {
    pub fn get_meta(&self, key: &str) -> StorageResult<Option<String>> {
        self.get_row(Table::Meta, &meta_key(key))
    }

    pub fn insert_meta(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.put_row(Table::Meta, meta_key(key), &value.to_string())
    }
}

impl Database {
    /// Stamp a fresh database with [`SCHEMA_VERSION`], or check that an
    /// existing one carries it.
    pub async fn initialize(&self) -> StorageResult<()> {
        let mut tx = self.begin().await;
        match tx.get_meta(SCHEMA_VERSION_KEY)? {
            Some(found) if found == SCHEMA_VERSION => Ok(()),
            Some(found) => Err(StorageError::SchemaMismatch {
                found,
                expected: SCHEMA_VERSION.to_string(),
            }),
            None => {
                tx.insert_meta(SCHEMA_VERSION_KEY, SCHEMA_VERSION)?;
                let meta = tx.get_sync_meta()?;
                tx.set_sync_meta(&meta)?;
                tx.commit()
            }
        }
    }
}

fn meta_key(key: &str) -> Vec<u8> {
    Table::Meta.key().bytes(key.as_bytes()).build()
}

//! Chain observer tables: sync cursor, keyper sets, collators.

use shared_types::{Address, BlockNumber, KeyperSet};

use crate::database::Tx;
use crate::domain::rows::{CollatorRow, SyncCursor};
use crate::domain::tables::Table;
use crate::error::{StorageError, StorageResult};

impl Tx {
    /// The stored sync cursor, if the observer ever committed one.
    pub fn get_sync_cursor(&self) -> StorageResult<Option<SyncCursor>> {
        self.get_row(Table::SyncCursor, Table::SyncCursor.prefix())
    }

    pub fn update_sync_cursor(&mut self, cursor: SyncCursor) -> StorageResult<()> {
        self.put_row(Table::SyncCursor, Table::SyncCursor.key().build(), &cursor)
    }

    /// Insert a keyper set. Sets are immutable; inserting a different set
    /// under an existing index fails, re-inserting the same set is a no-op.
    pub fn insert_keyper_set(&mut self, set: &KeyperSet) -> StorageResult<()> {
        let key = Table::KeyperSet.key().u64(set.index).build();
        match self.get_row::<KeyperSet>(Table::KeyperSet, &key)? {
            Some(existing) if existing == *set => Ok(()),
            Some(_) => Err(StorageError::AlreadyExists {
                table: Table::KeyperSet.name(),
                key: set.index.to_string(),
            }),
            None => self.put_row(Table::KeyperSet, key, set),
        }
    }

    pub fn get_keyper_set(&self, index: u64) -> StorageResult<Option<KeyperSet>> {
        self.get_row(Table::KeyperSet, &Table::KeyperSet.key().u64(index).build())
    }

    /// The keyper set active at `block`: highest activation block not after it.
    pub fn get_keyper_set_for_block(&self, block: BlockNumber) -> StorageResult<Option<KeyperSet>> {
        Ok(self
            .get_keyper_sets()?
            .into_iter()
            .filter(|s| s.activation_block <= block)
            .max_by_key(|s| (s.activation_block, s.index)))
    }

    /// All keyper sets ordered by index.
    pub fn get_keyper_sets(&self) -> StorageResult<Vec<KeyperSet>> {
        Ok(self
            .scan_rows::<KeyperSet>(Table::KeyperSet, Table::KeyperSet.prefix())?
            .into_iter()
            .map(|(_, s)| s)
            .collect())
    }

    /// Record the collator for blocks from `activation_block` on.
    pub fn insert_collator(&mut self, row: &CollatorRow) -> StorageResult<()> {
        let key = Table::Collator.key().u64(row.activation_block).build();
        match self.get_row::<CollatorRow>(Table::Collator, &key)? {
            Some(existing) if existing == *row => Ok(()),
            Some(_) => Err(StorageError::AlreadyExists {
                table: Table::Collator.name(),
                key: row.activation_block.to_string(),
            }),
            None => self.put_row(Table::Collator, key, row),
        }
    }

    /// The collator authorised to sign triggers for `block`.
    pub fn get_collator_for_block(&self, block: BlockNumber) -> StorageResult<Option<Address>> {
        let rows = self.scan_rows::<CollatorRow>(Table::Collator, Table::Collator.prefix())?;
        Ok(rows
            .into_iter()
            .map(|(_, r)| r)
            .take_while(|r| r.activation_block <= block)
            .last()
            .map(|r| r.collator))
    }
}

#[cfg(test)]
mod tests {
    use crate::{CollatorRow, Database, StorageError, SyncCursor};
    use shared_types::{Address, KeyperSet};

    fn set(index: u64, activation_block: u64) -> KeyperSet {
        KeyperSet {
            index,
            activation_block,
            keypers: vec![Address([1; 20]), Address([2; 20]), Address([3; 20])],
            threshold: 2,
        }
    }

    #[tokio::test]
    async fn test_sync_cursor_roundtrip() {
        let db = Database::in_memory();
        let mut tx = db.begin().await;
        assert_eq!(tx.get_sync_cursor().unwrap(), None);
        tx.update_sync_cursor(SyncCursor::new(101, 0)).unwrap();
        tx.commit().unwrap();

        let tx = db.begin().await;
        assert_eq!(tx.get_sync_cursor().unwrap(), Some(SyncCursor::new(101, 0)));
    }

    #[tokio::test]
    async fn test_keyper_set_is_immutable() {
        let db = Database::in_memory();
        let mut tx = db.begin().await;
        tx.insert_keyper_set(&set(1, 200)).unwrap();
        tx.insert_keyper_set(&set(1, 200)).unwrap();

        let err = tx.insert_keyper_set(&set(1, 300)).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
        assert_eq!(tx.get_keyper_set(1).unwrap(), Some(set(1, 200)));
    }

    #[tokio::test]
    async fn test_keyper_set_for_block() {
        let db = Database::in_memory();
        let mut tx = db.begin().await;
        tx.insert_keyper_set(&set(1, 200)).unwrap();
        tx.insert_keyper_set(&set(2, 500)).unwrap();

        assert_eq!(tx.get_keyper_set_for_block(100).unwrap(), None);
        assert_eq!(tx.get_keyper_set_for_block(499).unwrap().unwrap().index, 1);
        assert_eq!(tx.get_keyper_set_for_block(500).unwrap().unwrap().index, 2);
    }

    #[tokio::test]
    async fn test_collator_for_block() {
        let db = Database::in_memory();
        let mut tx = db.begin().await;
        let a = Address([0xA; 20]);
        let b = Address([0xB; 20]);
        tx.insert_collator(&CollatorRow {
            activation_block: 10,
            collator: a,
        })
        .unwrap();
        tx.insert_collator(&CollatorRow {
            activation_block: 300,
            collator: b,
        })
        .unwrap();

        assert_eq!(tx.get_collator_for_block(5).unwrap(), None);
        assert_eq!(tx.get_collator_for_block(10).unwrap(), Some(a));
        assert_eq!(tx.get_collator_for_block(299).unwrap(), Some(a));
        assert_eq!(tx.get_collator_for_block(1000).unwrap(), Some(b));
    }
}

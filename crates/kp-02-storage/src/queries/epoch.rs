//! Decryption key shares, decryption keys and triggers.

use shared_types::{EonIndex, EpochId, KeyperIndex};

use crate::database::Tx;
use crate::domain::rows::{DecryptionKeyShareRow, DecryptionTriggerRow};
use crate::domain::tables::Table;
use crate::error::StorageResult;

impl Tx {
    /// Insert a share unless one is stored for the same
    /// `(eon, epoch, keyper_index)`. Returns whether a row was written.
    pub fn insert_decryption_key_share(&mut self, row: &DecryptionKeyShareRow) -> StorageResult<bool> {
        let key = share_key(row.eon, &row.epoch_id, row.keyper_index);
        if self.exists_raw(&key)? {
            return Ok(false);
        }
        self.put_row(Table::DecryptionKeyShare, key, row)?;
        Ok(true)
    }

    pub fn get_decryption_key_share(
        &self,
        eon: EonIndex,
        epoch_id: &EpochId,
        keyper_index: KeyperIndex,
    ) -> StorageResult<Option<DecryptionKeyShareRow>> {
        self.get_row(
            Table::DecryptionKeyShare,
            &share_key(eon, epoch_id, keyper_index),
        )
    }

    pub fn exists_decryption_key_share(
        &self,
        eon: EonIndex,
        epoch_id: &EpochId,
        keyper_index: KeyperIndex,
    ) -> StorageResult<bool> {
        self.exists_raw(&share_key(eon, epoch_id, keyper_index))
    }

    /// All shares for `(eon, epoch)`, ordered by keyper index.
    pub fn select_decryption_key_shares(
        &self,
        eon: EonIndex,
        epoch_id: &EpochId,
    ) -> StorageResult<Vec<DecryptionKeyShareRow>> {
        let prefix = Table::DecryptionKeyShare
            .key()
            .u64(eon)
            .epoch(epoch_id)
            .build();
        Ok(self
            .scan_rows::<DecryptionKeyShareRow>(Table::DecryptionKeyShare, &prefix)?
            .into_iter()
            .map(|(_, r)| r)
            .collect())
    }

    /// Insert the key for `(eon, epoch)` if absent. Returns whether this call
    /// created the row.
    pub fn insert_decryption_key(
        &mut self,
        eon: EonIndex,
        epoch_id: &EpochId,
        key: Vec<u8>,
    ) -> StorageResult<bool> {
        let k = key_key(eon, epoch_id);
        if self.exists_raw(&k)? {
            return Ok(false);
        }
        self.put_raw(k, key);
        Ok(true)
    }

    pub fn get_decryption_key(&self, eon: EonIndex, epoch_id: &EpochId) -> StorageResult<Option<Vec<u8>>> {
        self.get_raw(&key_key(eon, epoch_id))
    }

    pub fn exists_decryption_key(&self, eon: EonIndex, epoch_id: &EpochId) -> StorageResult<bool> {
        self.exists_raw(&key_key(eon, epoch_id))
    }

    /// Record a trigger. Returns false if one was recorded already.
    pub fn insert_decryption_trigger(&mut self, row: &DecryptionTriggerRow) -> StorageResult<bool> {
        let key = Table::DecryptionTrigger
            .key()
            .u64(row.eon)
            .epoch(&row.epoch_id)
            .build();
        if self.exists_raw(&key)? {
            return Ok(false);
        }
        self.put_row(Table::DecryptionTrigger, key, row)?;
        Ok(true)
    }

    pub fn get_decryption_trigger(
        &self,
        eon: EonIndex,
        epoch_id: &EpochId,
    ) -> StorageResult<Option<DecryptionTriggerRow>> {
        self.get_row(
            Table::DecryptionTrigger,
            &Table::DecryptionTrigger.key().u64(eon).epoch(epoch_id).build(),
        )
    }
}

fn share_key(eon: EonIndex, epoch_id: &EpochId, keyper_index: KeyperIndex) -> Vec<u8> {
    Table::DecryptionKeyShare
        .key()
        .u64(eon)
        .epoch(epoch_id)
        .u64(keyper_index)
        .build()
}

fn key_key(eon: EonIndex, epoch_id: &EpochId) -> Vec<u8> {
    Table::DecryptionKey.key().u64(eon).epoch(epoch_id).build()
}

//! Keyper tables mirrored from the consensus chain, plus the orchestrator's
//! debounce cursors.

use shared_types::{Address, BlockNumber, EonIndex};

use crate::database::Tx;
use crate::domain::rows::{
    BatchConfigRow, DkgResultRow, EonPublicKeyRow, EonRow, EonStatus, PolyEvalRow,
    ShuttermintSyncMeta,
};
use crate::domain::tables::{read_u64, Table};
use crate::error::{StorageError, StorageResult};

impl Tx {
    // =========================================================================
    // BATCH CONFIGS
    // =========================================================================

    pub fn insert_batch_config(&mut self, row: &BatchConfigRow) -> StorageResult<()> {
        let key = Table::BatchConfig.key().u64(row.config_index).build();
        self.put_row(Table::BatchConfig, key, row)
    }

    pub fn get_batch_config(&self, config_index: u64) -> StorageResult<Option<BatchConfigRow>> {
        self.get_row(
            Table::BatchConfig,
            &Table::BatchConfig.key().u64(config_index).build(),
        )
    }

    /// Like [`Tx::get_batch_config`] but a missing row is an error.
    pub fn require_batch_config(&self, config_index: u64) -> StorageResult<BatchConfigRow> {
        self.get_batch_config(config_index)?
            .ok_or_else(|| StorageError::NotFound {
                table: Table::BatchConfig.name(),
                key: config_index.to_string(),
            })
    }

    /// The batch config with the highest index.
    pub fn get_latest_batch_config(&self) -> StorageResult<Option<BatchConfigRow>> {
        Ok(self.get_batch_configs()?.pop())
    }

    /// All batch configs ordered by index.
    pub fn get_batch_configs(&self) -> StorageResult<Vec<BatchConfigRow>> {
        Ok(self
            .scan_rows::<BatchConfigRow>(Table::BatchConfig, Table::BatchConfig.prefix())?
            .into_iter()
            .map(|(_, r)| r)
            .collect())
    }

    pub fn count_batch_configs(&self) -> StorageResult<usize> {
        Ok(self.scan_raw(Table::BatchConfig.prefix())?.len())
    }

    /// Batch configs including `member` whose activation block lies in
    /// `(after, up_to]`.
    pub fn count_batch_configs_in_block_range(
        &self,
        after: BlockNumber,
        up_to: BlockNumber,
        member: &Address,
    ) -> StorageResult<usize> {
        Ok(self
            .get_batch_configs()?
            .iter()
            .filter(|c| c.activation_block > after && c.activation_block <= up_to)
            .filter(|c| c.is_keyper(member))
            .count())
    }

    pub fn set_batch_config_started(&mut self, config_index: u64) -> StorageResult<()> {
        let mut row = self.require_batch_config(config_index)?;
        row.started = true;
        self.insert_batch_config(&row)
    }

    // =========================================================================
    // EONS
    // =========================================================================

    pub fn insert_eon(&mut self, row: &EonRow) -> StorageResult<()> {
        self.put_row(Table::Eon, Table::Eon.key().u64(row.eon).build(), row)
    }

    pub fn get_eon(&self, eon: EonIndex) -> StorageResult<Option<EonRow>> {
        self.get_row(Table::Eon, &Table::Eon.key().u64(eon).build())
    }

    /// All eons ordered by index.
    pub fn get_all_eons(&self) -> StorageResult<Vec<EonRow>> {
        Ok(self
            .scan_rows::<EonRow>(Table::Eon, Table::Eon.prefix())?
            .into_iter()
            .map(|(_, r)| r)
            .collect())
    }

    /// The eon responsible for `block`: the latest activation not after it,
    /// ties broken by the later start height.
    pub fn get_eon_for_block_number(&self, block: BlockNumber) -> StorageResult<Option<EonRow>> {
        Ok(self
            .get_all_eons()?
            .into_iter()
            .filter(|e| e.activation_block <= block)
            .max_by_key(|e| (e.activation_block, e.start_height)))
    }

    /// Highest eon started for `config_index`.
    pub fn get_latest_eon_for_config(&self, config_index: u64) -> StorageResult<Option<EonIndex>> {
        Ok(self
            .get_all_eons()?
            .into_iter()
            .filter(|e| e.config_index == config_index)
            .map(|e| e.eon)
            .max())
    }

    pub fn get_eon_status(&self, eon: EonIndex) -> StorageResult<EonStatus> {
        Ok(EonStatus::from_result(self.get_dkg_result(eon)?.as_ref()))
    }

    // =========================================================================
    // DKG STATE
    // =========================================================================

    pub fn put_pure_dkg(&mut self, eon: EonIndex, blob: Vec<u8>) {
        self.put_raw(Table::DkgState.key().u64(eon).build(), blob);
    }

    /// All persisted DKG instances, ordered by eon.
    pub fn select_pure_dkg(&self) -> StorageResult<Vec<(EonIndex, Vec<u8>)>> {
        let offset = Table::DkgState.prefix().len();
        self.scan_raw(Table::DkgState.prefix())?
            .into_iter()
            .map(|(k, v)| {
                read_u64(&k, offset)
                    .map(|eon| (eon, v))
                    .ok_or_else(|| StorageError::Codec {
                        table: Table::DkgState.name(),
                        message: "malformed key".into(),
                    })
            })
            .collect()
    }

    pub fn delete_pure_dkg(&mut self, eon: EonIndex) {
        self.delete_raw(Table::DkgState.key().u64(eon).build());
    }

    // =========================================================================
    // DKG RESULTS
    // =========================================================================

    /// Record the outcome of an eon's DKG. Fails if one is already stored.
    pub fn insert_dkg_result(&mut self, row: &DkgResultRow) -> StorageResult<()> {
        let key = Table::DkgResult.key().u64(row.eon).build();
        if self.exists_raw(&key)? {
            return Err(StorageError::AlreadyExists {
                table: Table::DkgResult.name(),
                key: row.eon.to_string(),
            });
        }
        self.put_row(Table::DkgResult, key, row)
    }

    pub fn get_dkg_result(&self, eon: EonIndex) -> StorageResult<Option<DkgResultRow>> {
        self.get_row(Table::DkgResult, &Table::DkgResult.key().u64(eon).build())
    }

    /// DKG result of the eon responsible for `block`.
    pub fn get_dkg_result_for_block_number(
        &self,
        block: BlockNumber,
    ) -> StorageResult<Option<DkgResultRow>> {
        match self.get_eon_for_block_number(block)? {
            Some(eon) => self.get_dkg_result(eon.eon),
            None => Ok(None),
        }
    }

    // =========================================================================
    // EON PUBLIC KEYS
    // =========================================================================

    pub fn insert_eon_public_key(&mut self, row: &EonPublicKeyRow) -> StorageResult<()> {
        let key = Table::EonPublicKeyPending.key().u64(row.eon).build();
        self.put_row(Table::EonPublicKeyPending, key, row)
    }

    /// All pending eon public keys, ordered by eon.
    pub fn get_eon_public_keys(&self) -> StorageResult<Vec<EonPublicKeyRow>> {
        Ok(self
            .scan_rows::<EonPublicKeyRow>(
                Table::EonPublicKeyPending,
                Table::EonPublicKeyPending.prefix(),
            )?
            .into_iter()
            .map(|(_, row)| row)
            .collect())
    }

    pub fn delete_eon_public_key(&mut self, eon: EonIndex) {
        self.delete_raw(Table::EonPublicKeyPending.key().u64(eon).build());
    }

    // =========================================================================
    // ENCRYPTION KEYS AND POLY EVALS
    // =========================================================================

    pub fn insert_encryption_key(&mut self, address: &Address, public_key: Vec<u8>) {
        self.put_raw(Table::EncryptionKey.key().address(address).build(), public_key);
    }

    pub fn get_encryption_key(&self, address: &Address) -> StorageResult<Option<Vec<u8>>> {
        self.get_raw(&Table::EncryptionKey.key().address(address).build())
    }

    /// All known encryption keys.
    pub fn get_encryption_keys(&self) -> StorageResult<Vec<(Address, Vec<u8>)>> {
        let offset = Table::EncryptionKey.prefix().len();
        self.scan_raw(Table::EncryptionKey.prefix())?
            .into_iter()
            .map(|(k, v)| {
                k.get(offset..)
                    .and_then(|raw| Address::from_slice(raw).ok())
                    .map(|a| (a, v))
                    .ok_or_else(|| StorageError::Codec {
                        table: Table::EncryptionKey.name(),
                        message: "malformed key".into(),
                    })
            })
            .collect()
    }

    pub fn insert_poly_eval(&mut self, row: &PolyEvalRow) -> StorageResult<()> {
        let key = Table::PolyEvalPending
            .key()
            .u64(row.eon)
            .address(&row.receiver)
            .build();
        self.put_row(Table::PolyEvalPending, key, row)
    }

    /// Pending poly evals whose receiver has checked in, with the receiver's
    /// encryption key. Ordered by eon, then receiver.
    pub fn poly_evals_with_encryption_keys(&self) -> StorageResult<Vec<(PolyEvalRow, Vec<u8>)>> {
        let mut out = Vec::new();
        for (_, row) in
            self.scan_rows::<PolyEvalRow>(Table::PolyEvalPending, Table::PolyEvalPending.prefix())?
        {
            if let Some(key) = self.get_encryption_key(&row.receiver)? {
                out.push((row, key));
            }
        }
        Ok(out)
    }

    pub fn delete_poly_eval(&mut self, eon: EonIndex, receiver: &Address) {
        self.delete_raw(
            Table::PolyEvalPending
                .key()
                .u64(eon)
                .address(receiver)
                .build(),
        );
    }

    /// Remove all pending poly evals of `eon`, returning how many existed.
    pub fn delete_poly_evals_by_eon(&mut self, eon: EonIndex) -> StorageResult<usize> {
        let prefix = Table::PolyEvalPending.key().u64(eon).build();
        let keys: Vec<Vec<u8>> = self.scan_raw(&prefix)?.into_iter().map(|(k, _)| k).collect();
        let count = keys.len();
        for key in keys {
            self.delete_raw(key);
        }
        Ok(count)
    }

    // =========================================================================
    // SYNC META AND CURSORS
    // =========================================================================

    /// Consensus sync position; a fresh database starts at block 0.
    pub fn get_sync_meta(&self) -> StorageResult<ShuttermintSyncMeta> {
        Ok(self
            .get_row(Table::ShuttermintSync, Table::ShuttermintSync.prefix())?
            .unwrap_or_default())
    }

    pub fn set_sync_meta(&mut self, meta: &ShuttermintSyncMeta) -> StorageResult<()> {
        self.put_row(
            Table::ShuttermintSync,
            Table::ShuttermintSync.key().build(),
            meta,
        )
    }

    pub fn get_last_committed_height(&self) -> StorageResult<i64> {
        Ok(self.get_sync_meta()?.last_committed_height)
    }

    pub fn get_last_block_seen(&self) -> StorageResult<BlockNumber> {
        Ok(self
            .get_row(Table::LastBlockSeen, Table::LastBlockSeen.prefix())?
            .unwrap_or(0))
    }

    pub fn set_last_block_seen(&mut self, block: BlockNumber) -> StorageResult<()> {
        self.put_row(Table::LastBlockSeen, Table::LastBlockSeen.key().build(), &block)
    }

    pub fn get_last_batch_config_sent(&self) -> StorageResult<Option<u64>> {
        self.get_row(Table::LastBatchConfigSent, Table::LastBatchConfigSent.prefix())
    }

    pub fn set_last_batch_config_sent(&mut self, config_index: u64) -> StorageResult<()> {
        self.put_row(
            Table::LastBatchConfigSent,
            Table::LastBatchConfigSent.key().build(),
            &config_index,
        )
    }
}

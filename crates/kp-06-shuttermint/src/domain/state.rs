//! # Shuttermint State
//!
//! The reducer applying consensus events to the keyper database. It owns
//! the live `PureDkg` instances of all eons whose DKG is still running and
//! is driven by exactly one writer, the consensus driver.
//!
//! ## Lifecycle per driver step
//!
//! 1. `load` (no-op while the in-memory copy is valid)
//! 2. `shift_phases` / `handle_event` for every transaction
//! 3. `before_save` encrypts and queues pending poly evals
//! 4. `save` persists every touched DKG
//!
//! On any error the driver rolls back its transaction and calls
//! `invalidate`, so the next step starts from the database again.
//!
//! Outgoing DKG traffic never leaves the reducer directly: it is written to
//! the outbound queue inside the same transaction.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use keyper_telemetry::KeyperMetrics;
use kp_02_storage::{BatchConfigRow, DkgResultRow, EonPublicKeyRow, EonRow, PolyEvalRow, Tx};
use kp_05_dkg::{
    decode_eval, encode_eval, AccusationMsg, ApologyMsg, Gammas, Phase, PolyCommitmentMsg,
    PolyEvalMsg, PureDkg,
};
use rand::rngs::OsRng;
use shared_crypto::{EncryptionKeyPair, EncryptionPublicKey, ValidatorPublicKey};
use shared_types::{Address, Clock, EonIndex, KeyperIndex};
use tracing::{debug, error, info, warn};

use super::events::{
    Accusation, Apology, BatchConfig, BatchConfigStarted, CheckIn, EonStarted, Event,
    PolyCommitment, PolyEval,
};
use super::messages::{batch_config_description, Message};
use super::phase_clock::PhaseLength;
use crate::error::{DriverError, DriverResult};

/// Identity of this keyper on the consensus chain.
#[derive(Debug, Clone)]
pub struct StateConfig {
    pub address: Address,
    pub validator_public_key: ValidatorPublicKey,
    pub encryption_key: EncryptionKeyPair,
    pub phase_length: PhaseLength,
}

/// A running DKG together with the data needed to address its peers.
#[derive(Debug)]
struct ActiveDkg {
    eon: EonRow,
    keypers: Vec<Address>,
    dkg: PureDkg,
    dirty: bool,
}

impl ActiveDkg {
    fn keyper_index(&self, address: &Address) -> Option<KeyperIndex> {
        self.keypers
            .iter()
            .position(|k| k == address)
            .map(|i| i as KeyperIndex)
    }

    fn keyper_address(&self, index: KeyperIndex) -> DriverResult<Address> {
        self.keypers.get(index as usize).copied().ok_or_else(|| {
            DriverError::Inconsistent(format!(
                "eon {} has no keyper with index {index}",
                self.eon.eon
            ))
        })
    }
}

pub struct ShuttermintState {
    config: StateConfig,
    clock: Arc<dyn Clock>,
    metrics: Option<KeyperMetrics>,
    loaded: bool,
    is_keyper: bool,
    encryption_keys: HashMap<Address, EncryptionPublicKey>,
    dkgs: BTreeMap<EonIndex, ActiveDkg>,
}

impl ShuttermintState {
    pub fn new(config: StateConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            metrics: None,
            loaded: false,
            is_keyper: false,
            encryption_keys: HashMap::new(),
            dkgs: BTreeMap::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: KeyperMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn address(&self) -> Address {
        self.config.address
    }

    pub fn is_keyper(&self) -> bool {
        self.is_keyper
    }

    /// Eons with a running DKG, ascending.
    pub fn active_eons(&self) -> Vec<EonIndex> {
        self.dkgs.keys().copied().collect()
    }

    pub fn dkg_phase(&self, eon: EonIndex) -> Option<Phase> {
        self.dkgs.get(&eon).map(|a| a.dkg.phase)
    }

    // =========================================================================
    // LOAD / SAVE
    // =========================================================================

    /// Read the reducer state from the database unless it is already loaded.
    pub fn load(&mut self, tx: &Tx) -> DriverResult<()> {
        if self.loaded {
            return Ok(());
        }
        let me = self.config.address;
        self.is_keyper = tx.get_batch_configs()?.iter().any(|c| c.is_keyper(&me));

        self.encryption_keys.clear();
        for (address, raw) in tx.get_encryption_keys()? {
            match EncryptionPublicKey::from_slice(&raw) {
                Ok(key) => {
                    self.encryption_keys.insert(address, key);
                }
                Err(err) => warn!(%address, %err, "ignoring stored encryption key"),
            }
        }

        self.dkgs.clear();
        for (eon, blob) in tx.select_pure_dkg()? {
            let dkg = PureDkg::decode(&blob)?;
            let eon_row = tx.get_eon(eon)?.ok_or_else(|| {
                DriverError::Inconsistent(format!("stored DKG for unknown eon {eon}"))
            })?;
            let config = tx.require_batch_config(eon_row.config_index)?;
            self.dkgs.insert(
                eon,
                ActiveDkg {
                    eon: eon_row,
                    keypers: config.keypers,
                    dkg,
                    dirty: false,
                },
            );
        }
        debug!(
            is_keyper = self.is_keyper,
            dkgs = self.dkgs.len(),
            "[shuttermint] state loaded"
        );
        self.loaded = true;
        Ok(())
    }

    /// Drop the in-memory copy; the next `load` re-reads the database.
    pub fn invalidate(&mut self) {
        self.loaded = false;
        self.is_keyper = false;
        self.encryption_keys.clear();
        self.dkgs.clear();
    }

    /// Persist every DKG touched since the last save.
    pub fn save(&mut self, tx: &mut Tx) -> DriverResult<()> {
        if !self.loaded {
            return Err(DriverError::Inconsistent("save called before load".into()));
        }
        for (eon, active) in self.dkgs.iter_mut().filter(|(_, a)| a.dirty) {
            tx.put_pure_dkg(*eon, active.dkg.encode()?);
            active.dirty = false;
        }
        Ok(())
    }

    /// Encrypt pending poly evals for receivers that have checked in and
    /// queue one `PolyEval` message per eon.
    pub fn before_save(&mut self, tx: &mut Tx) -> DriverResult<()> {
        let mut batches: BTreeMap<EonIndex, (Vec<Address>, Vec<Vec<u8>>)> = BTreeMap::new();
        for (row, raw_key) in tx.poly_evals_with_encryption_keys()? {
            let key = match EncryptionPublicKey::from_slice(&raw_key) {
                Ok(key) => key,
                Err(err) => {
                    warn!(eon = row.eon, receiver = %row.receiver, %err, "unusable encryption key");
                    continue;
                }
            };
            let encrypted = key.encrypt(&row.eval)?;
            let batch = batches.entry(row.eon).or_default();
            batch.0.push(row.receiver);
            batch.1.push(encrypted);
            tx.delete_poly_eval(row.eon, &row.receiver);
        }
        for (eon, (receivers, encrypted_evals)) in batches {
            self.schedule(
                tx,
                Message::PolyEval {
                    eon,
                    receivers,
                    encrypted_evals,
                },
            )?;
        }
        Ok(())
    }

    fn schedule(&self, tx: &mut Tx, msg: Message) -> DriverResult<()> {
        let bytes = msg
            .encode()
            .map_err(|e| DriverError::Codec(e.to_string()))?;
        tx.schedule_shutter_message(msg.description(), bytes, self.clock.now())?;
        Ok(())
    }

    fn set_phase_metric(&self, eon: EonIndex, phase: Phase) {
        if let Some(metrics) = &self.metrics {
            metrics.set_dkg_phase(eon, phase.as_i64());
        }
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    pub fn handle_event(&mut self, tx: &mut Tx, event: &Event) -> DriverResult<()> {
        debug!(height = event.height(), ?event, "[shuttermint] handling event");
        match event {
            Event::CheckIn(e) => self.handle_check_in(tx, e),
            Event::BatchConfig(e) => self.handle_batch_config(tx, e),
            Event::BatchConfigStarted(e) => self.handle_batch_config_started(tx, e),
            Event::EonStarted(e) => self.handle_eon_started(tx, e),
            Event::PolyCommitment(e) => {
                self.handle_poly_commitment(e);
                Ok(())
            }
            Event::PolyEval(e) => {
                self.handle_poly_eval(e);
                Ok(())
            }
            Event::Accusation(e) => {
                self.handle_accusation(e);
                Ok(())
            }
            Event::Apology(e) => {
                self.handle_apology(e);
                Ok(())
            }
        }
    }

    fn handle_check_in(&mut self, tx: &mut Tx, e: &CheckIn) -> DriverResult<()> {
        info!(sender = %e.sender, height = e.height, "keyper checked in");
        tx.insert_encryption_key(&e.sender, e.encryption_public_key.as_bytes().to_vec());
        self.encryption_keys.insert(e.sender, e.encryption_public_key);
        Ok(())
    }

    fn handle_batch_config(&mut self, tx: &mut Tx, e: &BatchConfig) -> DriverResult<()> {
        let me = self.config.address;
        if !self.is_keyper && e.keypers.contains(&me) {
            info!(config_index = e.config_index, "became keyper, checking in");
            self.is_keyper = true;
            self.schedule(
                tx,
                Message::CheckIn {
                    validator_public_key: self.config.validator_public_key.as_bytes().to_vec(),
                    encryption_public_key: self
                        .config
                        .encryption_key
                        .public_key()
                        .as_bytes()
                        .to_vec(),
                },
            )?;
        }
        tx.insert_batch_config(&BatchConfigRow {
            config_index: e.config_index,
            height: e.height,
            activation_block: e.activation_block_number,
            threshold: e.threshold,
            keypers: e.keypers.clone(),
            started: false,
        })?;
        let removed = tx.delete_shutter_message_by_desc(&batch_config_description(
            e.activation_block_number,
            e.config_index,
        ))?;
        if removed > 0 {
            debug!(config_index = e.config_index, removed, "dropped confirmed batch config proposal");
        }
        Ok(())
    }

    fn handle_batch_config_started(
        &mut self,
        tx: &mut Tx,
        e: &BatchConfigStarted,
    ) -> DriverResult<()> {
        match tx.set_batch_config_started(e.config_index) {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => {
                warn!(config_index = e.config_index, "start of unknown batch config");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn handle_eon_started(&mut self, tx: &mut Tx, e: &EonStarted) -> DriverResult<()> {
        if i64::try_from(e.activation_block_number).is_err() {
            error!(
                eon = e.eon,
                activation_block = e.activation_block_number,
                "activation block number does not fit into i64, ignoring eon"
            );
            return Ok(());
        }
        let eon_row = EonRow {
            eon: e.eon,
            start_height: e.height,
            activation_block: e.activation_block_number,
            config_index: e.config_index,
        };
        tx.insert_eon(&eon_row)?;
        info!(eon = e.eon, height = e.height, config_index = e.config_index, "eon started");

        if !self.is_keyper {
            return Ok(());
        }
        let config = tx.get_batch_config(e.config_index)?.ok_or_else(|| {
            DriverError::Inconsistent(format!(
                "eon {} started for unknown batch config {}",
                e.eon, e.config_index
            ))
        })?;
        let Some(keyper_index) = config.keyper_index(&self.config.address) else {
            debug!(eon = e.eon, "not a keyper for this eon");
            return Ok(());
        };

        let last_committed = tx.get_last_committed_height()?;
        let phase = self
            .config
            .phase_length
            .phase_at(last_committed.saturating_add(1), e.height);
        if phase > Phase::Dealing {
            warn!(eon = e.eon, ?phase, "missed the dealing phase of the DKG");
            return Ok(());
        }

        let dkg = PureDkg::new(
            e.eon,
            config.keypers.len() as u64,
            config.threshold,
            keyper_index,
        )?;
        info!(
            eon = e.eon,
            keyper_index,
            num_keypers = dkg.num_keypers,
            threshold = dkg.threshold,
            "starting DKG"
        );
        self.dkgs.insert(
            e.eon,
            ActiveDkg {
                eon: eon_row,
                keypers: config.keypers,
                dkg,
                dirty: true,
            },
        );
        self.set_phase_metric(e.eon, Phase::Off);
        self.shift_phase(tx, e.eon, e.height)
    }

    fn handle_poly_commitment(&mut self, e: &PolyCommitment) {
        let Some(active) = self.dkgs.get_mut(&e.eon) else {
            debug!(eon = e.eon, "poly commitment for eon without running DKG");
            return;
        };
        let Some(sender) = active.keyper_index(&e.sender) else {
            warn!(eon = e.eon, sender = %e.sender, "poly commitment from non-keyper");
            return;
        };
        let gammas = match Gammas::from_bytes(&e.gammas) {
            Ok(gammas) => gammas,
            Err(err) => {
                warn!(eon = e.eon, sender = %e.sender, %err, "undecodable poly commitment");
                return;
            }
        };
        let msg = PolyCommitmentMsg {
            eon: e.eon,
            sender,
            gammas,
        };
        match active.dkg.handle_poly_commitment(msg) {
            Ok(()) => active.dirty = true,
            Err(err) => warn!(eon = e.eon, sender = %e.sender, %err, "rejected poly commitment"),
        }
    }

    fn handle_poly_eval(&mut self, e: &PolyEval) {
        let me = self.config.address;
        if e.sender == me {
            return;
        }
        let Some(active) = self.dkgs.get_mut(&e.eon) else {
            debug!(eon = e.eon, "poly eval for eon without running DKG");
            return;
        };
        let Some(sender) = active.keyper_index(&e.sender) else {
            warn!(eon = e.eon, sender = %e.sender, "poly eval from non-keyper");
            return;
        };
        let Some(position) = e.receivers.iter().position(|r| *r == me) else {
            return;
        };
        let Some(encrypted) = e.encrypted_evals.get(position) else {
            return;
        };
        let eval = match self
            .config
            .encryption_key
            .decrypt(encrypted)
            .map_err(DriverError::from)
            .and_then(|plain| decode_eval(&plain).map_err(DriverError::from))
        {
            Ok(eval) => eval,
            Err(err) => {
                warn!(eon = e.eon, sender = %e.sender, %err, "cannot read poly eval");
                return;
            }
        };
        let msg = PolyEvalMsg {
            eon: e.eon,
            sender,
            receiver: active.dkg.keyper,
            eval,
        };
        match active.dkg.handle_poly_eval(msg) {
            Ok(()) => active.dirty = true,
            Err(err) => warn!(eon = e.eon, sender = %e.sender, %err, "rejected poly eval"),
        }
    }

    fn handle_accusation(&mut self, e: &Accusation) {
        let Some(active) = self.dkgs.get_mut(&e.eon) else {
            debug!(eon = e.eon, "accusation for eon without running DKG");
            return;
        };
        let Some(accuser) = active.keyper_index(&e.sender) else {
            warn!(eon = e.eon, sender = %e.sender, "accusation from non-keyper");
            return;
        };
        for accused_address in &e.accused {
            let Some(accused) = active.keyper_index(accused_address) else {
                warn!(eon = e.eon, accused = %accused_address, "accusation against non-keyper");
                continue;
            };
            let msg = AccusationMsg {
                eon: e.eon,
                accuser,
                accused,
            };
            match active.dkg.handle_accusation(msg) {
                Ok(()) => active.dirty = true,
                Err(err) => warn!(eon = e.eon, sender = %e.sender, %err, "rejected accusation"),
            }
        }
    }

    fn handle_apology(&mut self, e: &Apology) {
        let Some(active) = self.dkgs.get_mut(&e.eon) else {
            debug!(eon = e.eon, "apology for eon without running DKG");
            return;
        };
        let Some(accused) = active.keyper_index(&e.sender) else {
            warn!(eon = e.eon, sender = %e.sender, "apology from non-keyper");
            return;
        };
        for (accuser_address, raw_eval) in e.accusers.iter().zip(&e.poly_evals) {
            let Some(accuser) = active.keyper_index(accuser_address) else {
                warn!(eon = e.eon, accuser = %accuser_address, "apology to non-keyper");
                continue;
            };
            let eval = match decode_eval(raw_eval) {
                Ok(eval) => eval,
                Err(err) => {
                    warn!(eon = e.eon, sender = %e.sender, %err, "undecodable apology");
                    continue;
                }
            };
            let msg = ApologyMsg {
                eon: e.eon,
                accuser,
                accused,
                eval,
            };
            match active.dkg.handle_apology(msg) {
                Ok(()) => active.dirty = true,
                Err(err) => warn!(eon = e.eon, sender = %e.sender, %err, "rejected apology"),
            }
        }
    }

    // =========================================================================
    // PHASE TRANSITIONS
    // =========================================================================

    /// Move every running DKG to the phase defined by `height`.
    pub fn shift_phases(&mut self, tx: &mut Tx, height: i64) -> DriverResult<()> {
        for eon in self.active_eons() {
            self.shift_phase(tx, eon, height)?;
        }
        Ok(())
    }

    fn shift_phase(&mut self, tx: &mut Tx, eon: EonIndex, height: i64) -> DriverResult<()> {
        loop {
            let Some(active) = self.dkgs.get(&eon) else {
                return Ok(());
            };
            let target = self
                .config
                .phase_length
                .phase_at(height, active.eon.start_height);
            let current = active.dkg.phase;
            if current >= target {
                return Ok(());
            }
            match current {
                Phase::Off => self.start_dealing(tx, eon)?,
                Phase::Dealing => self.start_accusing(tx, eon)?,
                Phase::Accusing => self.start_apologizing(tx, eon)?,
                Phase::Apologizing => return self.finalize(tx, eon),
                Phase::Finalized => return Ok(()),
            }
            if let Some(active) = self.dkgs.get(&eon) {
                debug!(eon, height, phase = %active.dkg.phase, "DKG phase shifted");
                self.set_phase_metric(eon, active.dkg.phase);
            }
        }
    }

    fn active_mut(&mut self, eon: EonIndex) -> DriverResult<&mut ActiveDkg> {
        self.dkgs
            .get_mut(&eon)
            .ok_or_else(|| DriverError::Inconsistent(format!("no running DKG for eon {eon}")))
    }

    fn start_dealing(&mut self, tx: &mut Tx, eon: EonIndex) -> DriverResult<()> {
        let active = self.active_mut(eon)?;
        let (commitment, evals) = active.dkg.start_phase1_dealing(OsRng)?;
        active.dirty = true;

        let mut rows = Vec::with_capacity(evals.len());
        for eval in &evals {
            rows.push(PolyEvalRow {
                eon,
                receiver: active.keyper_address(eval.receiver)?,
                eval: encode_eval(&eval.eval),
            });
        }
        for row in &rows {
            tx.insert_poly_eval(row)?;
        }
        self.schedule(
            tx,
            Message::PolyCommitment {
                eon,
                gammas: commitment.gammas.to_bytes(),
            },
        )
    }

    fn start_accusing(&mut self, tx: &mut Tx, eon: EonIndex) -> DriverResult<()> {
        let active = self.active_mut(eon)?;
        let accusations = active.dkg.start_phase2_accusing()?;
        active.dirty = true;
        if accusations.is_empty() {
            return Ok(());
        }
        let accused = accusations
            .iter()
            .map(|a| active.keyper_address(a.accused))
            .collect::<DriverResult<Vec<_>>>()?;
        self.schedule(tx, Message::Accusation { eon, accused })
    }

    fn start_apologizing(&mut self, tx: &mut Tx, eon: EonIndex) -> DriverResult<()> {
        let active = self.active_mut(eon)?;
        let apologies = active.dkg.start_phase3_apologizing()?;
        active.dirty = true;
        if apologies.is_empty() {
            return Ok(());
        }
        let accusers = apologies
            .iter()
            .map(|a| active.keyper_address(a.accuser))
            .collect::<DriverResult<Vec<_>>>()?;
        let poly_evals = apologies.iter().map(|a| encode_eval(&a.eval)).collect();
        self.schedule(
            tx,
            Message::Apology {
                eon,
                accusers,
                poly_evals,
            },
        )
    }

    fn finalize(&mut self, tx: &mut Tx, eon: EonIndex) -> DriverResult<()> {
        let Some(mut active) = self.dkgs.remove(&eon) else {
            return Ok(());
        };
        active.dkg.finalize()?;
        tx.delete_pure_dkg(eon);
        tx.delete_poly_evals_by_eon(eon)?;

        let success = match active.dkg.compute_result() {
            Ok(result) => {
                tx.insert_eon_public_key(&EonPublicKeyRow {
                    eon,
                    eon_public_key: result.public_key.to_bytes(),
                    activation_block: active.eon.activation_block,
                    config_index: active.eon.config_index,
                    keypers: active.keypers.clone(),
                })?;
                tx.insert_dkg_result(&DkgResultRow {
                    eon,
                    success: true,
                    error: None,
                    pure_result: result.encode()?,
                })?;
                info!(eon, "DKG finished successfully");
                true
            }
            Err(err) => {
                error!(eon, %err, "DKG failed");
                tx.insert_dkg_result(&DkgResultRow {
                    eon,
                    success: false,
                    error: Some(err.to_string()),
                    pure_result: Vec::new(),
                })?;
                false
            }
        };
        self.schedule(tx, Message::DkgResult { eon, success })?;

        self.set_phase_metric(eon, Phase::Finalized);
        if let Some(metrics) = &self.metrics {
            metrics.set_dkg_success(eon, success);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ShuttermintState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShuttermintState")
            .field("address", &self.config.address)
            .field("loaded", &self.loaded)
            .field("is_keyper", &self.is_keyper)
            .field("active_eons", &self.active_eons())
            .finish_non_exhaustive()
    }
}

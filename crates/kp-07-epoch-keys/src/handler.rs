//! # Epoch Key Handler
//!
//! One database transaction per inbound message. Every path that emits a
//! message writes the matching row first, in the same transaction, so a
//! repeated trigger or share finds the row and stays silent.
//!
//! | Input | Stored | Emitted |
//! |-------|--------|---------|
//! | trigger | own share, trigger | own share, key if the threshold is met |
//! | peer share | share | key if the threshold is met |
//! | peer key | key | nothing |
//!
//! A key is emitted only by the call whose conditional insert created the
//! key row, so every keyper emits each epoch key at most once.

use async_trait::async_trait;
use keyper_telemetry::KeyperMetrics;
use kp_02_storage::{Database, DecryptionKeyShareRow, DecryptionTriggerRow, Tx};
use kp_05_dkg::{DkgResult, EpochKg, EpochSecretKey, EpochSecretKeyShare, EpochSecretKeyShareMsg};
use shared_bus::{
    DecryptionKey, DecryptionKeyShare, DecryptionTrigger, MessageValidator, P2PMessage,
    ValidationResult,
};
use shared_types::{Address, EonIndex, EpochId, InstanceId, KeyperIndex};
use tracing::{debug, info, warn};

use crate::domain::trigger::{TriggerDrop, TriggerRequest};
use crate::error::EpochKeyResult;

pub struct EpochKeyHandler {
    db: Database,
    instance_id: InstanceId,
    address: Address,
    metrics: Option<KeyperMetrics>,
}

/// What a trigger resolved to before any write.
struct Accepted {
    eon: EonIndex,
    keyper_index: KeyperIndex,
    result: DkgResult,
}

impl EpochKeyHandler {
    pub fn new(db: Database, instance_id: InstanceId, address: Address) -> Self {
        Self {
            db,
            instance_id,
            address,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: KeyperMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Route a gossip message to its handler.
    pub async fn handle_message(&self, msg: &P2PMessage) -> EpochKeyResult<Vec<P2PMessage>> {
        match msg {
            P2PMessage::DecryptionTrigger(trigger) => {
                self.handle_trigger(&TriggerRequest::from_gossip(trigger.clone()))
                    .await
            }
            P2PMessage::DecryptionKeyShare(share) => self.handle_key_share(share).await,
            P2PMessage::DecryptionKey(key) => {
                self.handle_key(key).await?;
                Ok(Vec::new())
            }
            P2PMessage::EonPublicKey(key) => {
                debug!(eon = key.eon, "[epoch-keys] eon public key from peer");
                Ok(Vec::new())
            }
        }
    }

    // =========================================================================
    // TRIGGERS
    // =========================================================================

    /// Compute and store this keyper's share for the triggered epoch.
    ///
    /// Returns the share message, followed by the key message if the new
    /// share completed the threshold. A dropped trigger returns nothing.
    pub async fn handle_trigger(
        &self,
        request: &TriggerRequest,
    ) -> EpochKeyResult<Vec<P2PMessage>> {
        let trigger = &request.trigger;
        if let Some(metrics) = &self.metrics {
            metrics.decryption_triggers_received.inc();
        }

        let mut tx = self.db.begin().await;
        let accepted = match self.accept_trigger(&tx, request)? {
            Ok(accepted) => accepted,
            Err(reason) => {
                debug!(
                    epoch_id = %trigger.epoch_id,
                    block = trigger.block_number,
                    %reason,
                    "[epoch-keys] ignoring decryption trigger"
                );
                return Ok(Vec::new());
            }
        };

        let share = accepted.result.epoch_secret_key_share(&trigger.epoch_id);
        let share_bytes = share.to_bytes();
        tx.insert_decryption_key_share(&DecryptionKeyShareRow {
            eon: accepted.eon,
            epoch_id: trigger.epoch_id,
            keyper_index: accepted.keyper_index,
            share: share_bytes.clone(),
        })?;
        tx.insert_decryption_trigger(&DecryptionTriggerRow {
            eon: accepted.eon,
            epoch_id: trigger.epoch_id,
            block_number: trigger.block_number,
        })?;
        let key = self.try_aggregate(&mut tx, accepted.eon, &trigger.epoch_id, &accepted.result)?;
        tx.commit()?;

        if let Some(metrics) = &self.metrics {
            metrics.decryption_keyshares_sent.inc();
        }
        info!(
            eon = accepted.eon,
            epoch_id = %trigger.epoch_id,
            keyper_index = accepted.keyper_index,
            "[epoch-keys] sending decryption key share"
        );

        let mut out = vec![P2PMessage::DecryptionKeyShare(DecryptionKeyShare {
            instance_id: self.instance_id,
            eon: accepted.eon,
            epoch_id: trigger.epoch_id,
            keyper_index: accepted.keyper_index,
            share: share_bytes,
        })];
        out.extend(key.map(P2PMessage::DecryptionKey));
        Ok(out)
    }

    fn accept_trigger(
        &self,
        tx: &Tx,
        request: &TriggerRequest,
    ) -> EpochKeyResult<Result<Accepted, TriggerDrop>> {
        let trigger = &request.trigger;
        if trigger.instance_id != self.instance_id {
            return Ok(Err(TriggerDrop::WrongInstance));
        }
        let Some(eon) = tx.get_eon_for_block_number(trigger.block_number)? else {
            return Ok(Err(TriggerDrop::NoEon));
        };
        let Some(row) = tx.get_dkg_result(eon.eon)? else {
            return Ok(Err(TriggerDrop::NoDkgResult));
        };
        if !row.success {
            return Ok(Err(TriggerDrop::DkgFailed));
        }
        let config = tx.require_batch_config(eon.config_index)?;
        let Some(keyper_index) = config.keyper_index(&self.address) else {
            return Ok(Err(TriggerDrop::NotKeyper));
        };
        if tx.exists_decryption_key_share(eon.eon, &trigger.epoch_id, keyper_index)? {
            return Ok(Err(TriggerDrop::AlreadyShared));
        }
        if request.verify_signature {
            if let Err(reason) = check_collator_signature(tx, trigger)? {
                return Ok(Err(reason));
            }
        }
        Ok(Ok(Accepted {
            eon: eon.eon,
            keyper_index,
            result: DkgResult::decode(&row.pure_result)?,
        }))
    }

    // =========================================================================
    // PEER SHARES AND KEYS
    // =========================================================================

    /// Store a peer's share and assemble the key if enough shares are known.
    ///
    /// The share must have passed [`MessageValidator::validate`].
    pub async fn handle_key_share(
        &self,
        msg: &DecryptionKeyShare,
    ) -> EpochKeyResult<Vec<P2PMessage>> {
        if let Some(metrics) = &self.metrics {
            metrics.decryption_keyshares_received.inc();
        }

        let mut tx = self.db.begin().await;
        let Some(result) = successful_result(&tx, msg.eon)? else {
            debug!(eon = msg.eon, "[epoch-keys] share for eon without dkg result");
            return Ok(Vec::new());
        };
        let inserted = tx.insert_decryption_key_share(&DecryptionKeyShareRow {
            eon: msg.eon,
            epoch_id: msg.epoch_id,
            keyper_index: msg.keyper_index,
            share: msg.share.clone(),
        })?;
        if !inserted {
            debug!(
                eon = msg.eon,
                epoch_id = %msg.epoch_id,
                keyper_index = msg.keyper_index,
                "[epoch-keys] share already stored"
            );
        }
        let key = self.try_aggregate(&mut tx, msg.eon, &msg.epoch_id, &result)?;
        tx.commit()?;
        Ok(key.map(P2PMessage::DecryptionKey).into_iter().collect())
    }

    /// Store a peer's key. Returns whether it was new.
    ///
    /// The key must have passed [`MessageValidator::validate`].
    pub async fn handle_key(&self, msg: &DecryptionKey) -> EpochKeyResult<bool> {
        if let Some(metrics) = &self.metrics {
            metrics.decryption_keys_received.inc();
        }
        let mut tx = self.db.begin().await;
        let inserted = tx.insert_decryption_key(msg.eon, &msg.epoch_id, msg.key.clone())?;
        tx.commit()?;
        if inserted {
            info!(eon = msg.eon, epoch_id = %msg.epoch_id, "[epoch-keys] stored decryption key from peer");
        } else {
            debug!(eon = msg.eon, epoch_id = %msg.epoch_id, "[epoch-keys] decryption key already known");
        }
        Ok(inserted)
    }

    /// Assemble and store the key of `(eon, epoch_id)` from the stored
    /// shares. Returns the key message only if this call stored the key.
    fn try_aggregate(
        &self,
        tx: &mut Tx,
        eon: EonIndex,
        epoch_id: &EpochId,
        result: &DkgResult,
    ) -> EpochKeyResult<Option<DecryptionKey>> {
        if tx.exists_decryption_key(eon, epoch_id)? {
            return Ok(None);
        }
        let shares = tx.select_decryption_key_shares(eon, epoch_id)?;
        if (shares.len() as u64) < result.threshold {
            debug!(
                eon,
                %epoch_id,
                have = shares.len(),
                need = result.threshold,
                "[epoch-keys] not enough shares yet"
            );
            return Ok(None);
        }

        let mut kg = EpochKg::new(result.clone());
        for row in shares {
            let share = match EpochSecretKeyShare::from_bytes(&row.share) {
                Ok(share) => share,
                Err(err) => {
                    warn!(eon, %epoch_id, keyper_index = row.keyper_index, error = %err, "[epoch-keys] skipping undecodable share");
                    continue;
                }
            };
            let msg = EpochSecretKeyShareMsg {
                eon,
                epoch_id: *epoch_id,
                sender: row.keyper_index,
                share,
            };
            if let Err(err) = kg.handle_epoch_secret_key_share(msg) {
                warn!(eon, %epoch_id, keyper_index = row.keyper_index, error = %err, "[epoch-keys] skipping share");
            }
        }
        let Some(key) = kg.secret_key(epoch_id) else {
            return Ok(None);
        };

        let key = key.to_bytes();
        if !tx.insert_decryption_key(eon, epoch_id, key.clone())? {
            return Ok(None);
        }
        if let Some(metrics) = &self.metrics {
            metrics.decryption_keys_generated.inc();
        }
        info!(eon, %epoch_id, "[epoch-keys] generated decryption key");
        Ok(Some(DecryptionKey {
            instance_id: self.instance_id,
            eon,
            epoch_id: *epoch_id,
            key,
        }))
    }

    // =========================================================================
    // VALIDATION
    // =========================================================================

    async fn validate_trigger(&self, trigger: &DecryptionTrigger) -> EpochKeyResult<ValidationResult> {
        let tx = self.db.read();
        Ok(match check_collator_signature(&tx, trigger)? {
            Ok(()) => ValidationResult::Accept,
            Err(reason) => {
                debug!(epoch_id = %trigger.epoch_id, block = trigger.block_number, %reason, "[epoch-keys] invalid trigger");
                ValidationResult::Reject
            }
        })
    }

    async fn validate_key_share(&self, msg: &DecryptionKeyShare) -> EpochKeyResult<ValidationResult> {
        let tx = self.db.read();
        let Some(result) = successful_result(&tx, msg.eon)? else {
            return Ok(ValidationResult::Reject);
        };
        let Ok(share) = EpochSecretKeyShare::from_bytes(&msg.share) else {
            return Ok(ValidationResult::Reject);
        };
        Ok(match result.verify_share(msg.keyper_index, &share, &msg.epoch_id) {
            Ok(true) => ValidationResult::Accept,
            Ok(false) | Err(_) => ValidationResult::Reject,
        })
    }

    async fn validate_key(&self, msg: &DecryptionKey) -> EpochKeyResult<ValidationResult> {
        let tx = self.db.read();
        let Some(result) = successful_result(&tx, msg.eon)? else {
            return Ok(ValidationResult::Reject);
        };
        let Ok(key) = EpochSecretKey::from_bytes(&msg.key) else {
            return Ok(ValidationResult::Reject);
        };
        Ok(if result.verify_key(&key, &msg.epoch_id) {
            ValidationResult::Accept
        } else {
            ValidationResult::Reject
        })
    }
}

#[async_trait]
impl MessageValidator for EpochKeyHandler {
    async fn validate(&self, msg: &P2PMessage) -> ValidationResult {
        let res = match msg {
            P2PMessage::DecryptionTrigger(trigger) => self.validate_trigger(trigger).await,
            P2PMessage::DecryptionKeyShare(share) => self.validate_key_share(share).await,
            P2PMessage::DecryptionKey(key) => self.validate_key(key).await,
            P2PMessage::EonPublicKey(_) => Ok(ValidationResult::Accept),
        };
        match res {
            Ok(result) => {
                if result == ValidationResult::Reject {
                    debug!(topic = %msg.topic(), msg = %msg.log_info(), "[epoch-keys] validation failed");
                }
                result
            }
            Err(err) => {
                warn!(topic = %msg.topic(), error = %err, "[epoch-keys] cannot validate message");
                ValidationResult::Ignore
            }
        }
    }
}

impl std::fmt::Debug for EpochKeyHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochKeyHandler")
            .field("instance_id", &self.instance_id)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// The decoded DKG result of `eon`, if its DKG succeeded.
fn successful_result(tx: &Tx, eon: EonIndex) -> EpochKeyResult<Option<DkgResult>> {
    match tx.get_dkg_result(eon)? {
        Some(row) if row.success => Ok(Some(DkgResult::decode(&row.pure_result)?)),
        _ => Ok(None),
    }
}

fn check_collator_signature(
    tx: &Tx,
    trigger: &DecryptionTrigger,
) -> EpochKeyResult<Result<(), TriggerDrop>> {
    let Some(collator) = tx.get_collator_for_block(trigger.block_number)? else {
        return Ok(Err(TriggerDrop::NoCollator));
    };
    Ok(match trigger.signer() {
        Ok(signer) if signer == collator => Ok(()),
        _ => Err(TriggerDrop::BadSignature),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{keyper_address, seed_eon, EON, INSTANCE};
    use kp_02_storage::{DkgResultRow, EonRow};
    use kp_05_dkg::testkeygen::EonKeys;
    use shared_crypto::Secp256k1KeyPair;

    struct Keyper {
        handler: EpochKeyHandler,
        db: Database,
        metrics: KeyperMetrics,
    }

    async fn setup(keys: &EonKeys, index: u8, collator: &Secp256k1KeyPair) -> Keyper {
        let db = Database::in_memory();
        seed_eon(&db, keys, u64::from(index), collator).await;
        let metrics = KeyperMetrics::detached().unwrap();
        Keyper {
            handler: EpochKeyHandler::new(db.clone(), INSTANCE, keyper_address(index))
                .with_metrics(metrics.clone()),
            db,
            metrics,
        }
    }

    fn signed_trigger(collator: &Secp256k1KeyPair, epoch: u64) -> TriggerRequest {
        TriggerRequest::from_gossip(
            DecryptionTrigger::signed(INSTANCE, EpochId::from_u64(epoch), 210, collator).unwrap(),
        )
    }

    fn share_of(msgs: &[P2PMessage]) -> DecryptionKeyShare {
        match &msgs[0] {
            P2PMessage::DecryptionKeyShare(share) => share.clone(),
            other => panic!("expected share, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_trigger_emits_share_once() {
        let keys = EonKeys::generate_seeded(3, 2, 1);
        let collator = Secp256k1KeyPair::generate();
        let k = setup(&keys, 0, &collator).await;
        let request = signed_trigger(&collator, 1);

        let out = k.handler.handle_trigger(&request).await.unwrap();
        assert_eq!(out.len(), 1);
        let share = share_of(&out);
        assert_eq!(share.keyper_index, 0);
        assert_eq!(share.eon, EON);

        let tx = k.db.begin().await;
        let stored = tx
            .get_decryption_key_share(EON, &EpochId::from_u64(1), 0)
            .unwrap()
            .unwrap();
        assert_eq!(stored.share, share.share);
        assert!(tx.get_decryption_trigger(EON, &EpochId::from_u64(1)).unwrap().is_some());
        drop(tx);

        for _ in 0..3 {
            assert!(k.handler.handle_trigger(&request).await.unwrap().is_empty());
        }
        assert_eq!(k.metrics.decryption_triggers_received.get(), 4);
        assert_eq!(k.metrics.decryption_keyshares_sent.get(), 1);
    }

    #[tokio::test]
    async fn test_trigger_signature_checked_unless_admin() {
        let keys = EonKeys::generate_seeded(3, 2, 1);
        let collator = Secp256k1KeyPair::generate();
        let k = setup(&keys, 1, &collator).await;

        let forged = signed_trigger(&Secp256k1KeyPair::generate(), 1);
        assert!(k.handler.handle_trigger(&forged).await.unwrap().is_empty());

        let admin = TriggerRequest::admin(INSTANCE, EpochId::from_u64(1), 210);
        let out = k.handler.handle_trigger(&admin).await.unwrap();
        assert_eq!(share_of(&out).keyper_index, 1);
    }

    #[tokio::test]
    async fn test_trigger_drops() {
        let keys = EonKeys::generate_seeded(3, 2, 1);
        let collator = Secp256k1KeyPair::generate();
        let k = setup(&keys, 0, &collator).await;

        let wrong_instance = TriggerRequest::admin(INSTANCE + 1, EpochId::from_u64(1), 210);
        let before_activation = TriggerRequest::admin(INSTANCE, EpochId::from_u64(1), 150);
        let tx = k.db.begin().await;
        assert_eq!(
            k.handler.accept_trigger(&tx, &wrong_instance).unwrap().err(),
            Some(TriggerDrop::WrongInstance)
        );
        assert_eq!(
            k.handler.accept_trigger(&tx, &before_activation).unwrap().err(),
            Some(TriggerDrop::NoEon)
        );
        drop(tx);

        let outsider = EpochKeyHandler::new(k.db.clone(), INSTANCE, Address([0xff; 20]));
        let tx = k.db.begin().await;
        let request = TriggerRequest::admin(INSTANCE, EpochId::from_u64(1), 210);
        assert_eq!(
            outsider.accept_trigger(&tx, &request).unwrap().err(),
            Some(TriggerDrop::NotKeyper)
        );
    }

    #[tokio::test]
    async fn test_failed_dkg_drops_trigger() {
        let keys = EonKeys::generate_seeded(3, 2, 1);
        let collator = Secp256k1KeyPair::generate();
        let k = setup(&keys, 0, &collator).await;
        {
            let mut tx = k.db.begin().await;
            tx.insert_eon(&EonRow {
                eon: EON + 1,
                start_height: 6000,
                activation_block: 300,
                config_index: 1,
            })
            .unwrap();
            tx.insert_dkg_result(&DkgResultRow {
                eon: EON + 1,
                success: false,
                error: Some("no qualified dealers".into()),
                pure_result: Vec::new(),
            })
            .unwrap();
            tx.commit().unwrap();
        }
        let request = TriggerRequest::admin(INSTANCE, EpochId::from_u64(1), 310);
        assert!(k.handler.handle_trigger(&request).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_of_peer_shares_emits_one_key() {
        let keys = EonKeys::generate_seeded(3, 2, 2);
        let collator = Secp256k1KeyPair::generate();
        let a = setup(&keys, 0, &collator).await;
        let b = setup(&keys, 1, &collator).await;
        let request = signed_trigger(&collator, 5);

        let own = a.handler.handle_trigger(&request).await.unwrap();
        assert_eq!(own.len(), 1);
        let peer = share_of(&b.handler.handle_trigger(&request).await.unwrap());

        assert_eq!(
            a.handler.validate(&peer.clone().into()).await,
            ValidationResult::Accept
        );
        let out = a.handler.handle_key_share(&peer).await.unwrap();
        assert_eq!(out.len(), 1);
        let P2PMessage::DecryptionKey(key) = &out[0] else {
            panic!("expected key, got {out:?}");
        };
        let result = keys.dkg_result(0, EON);
        let decoded = EpochSecretKey::from_bytes(&key.key).unwrap();
        assert!(result.verify_key(&decoded, &EpochId::from_u64(5)));

        // redelivery stores nothing new and emits nothing
        assert!(a.handler.handle_key_share(&peer).await.unwrap().is_empty());
        assert_eq!(a.metrics.decryption_keys_generated.get(), 1);
        assert_eq!(a.metrics.decryption_keyshares_received.get(), 2);
    }

    #[tokio::test]
    async fn test_threshold_one_trigger_emits_key() {
        let keys = EonKeys::generate_seeded(1, 1, 3);
        let collator = Secp256k1KeyPair::generate();
        let k = setup(&keys, 0, &collator).await;

        let out = k
            .handler
            .handle_trigger(&signed_trigger(&collator, 9))
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(matches!(out[1], P2PMessage::DecryptionKey(_)));
        let tx = k.db.begin().await;
        assert!(tx.exists_decryption_key(EON, &EpochId::from_u64(9)).unwrap());
    }

    #[tokio::test]
    async fn test_share_validation() {
        let keys = EonKeys::generate_seeded(3, 2, 4);
        let collator = Secp256k1KeyPair::generate();
        let a = setup(&keys, 0, &collator).await;
        let b = setup(&keys, 1, &collator).await;
        let peer = share_of(
            &b.handler
                .handle_trigger(&signed_trigger(&collator, 1))
                .await
                .unwrap(),
        );

        let mut wrong_index = peer.clone();
        wrong_index.keyper_index = 2;
        let mut out_of_range = peer.clone();
        out_of_range.keyper_index = 9;
        let mut garbage = peer.clone();
        garbage.share = vec![1, 2, 3];
        let mut unknown_eon = peer.clone();
        unknown_eon.eon = EON + 1;

        for bad in [wrong_index, out_of_range, garbage, unknown_eon] {
            assert_eq!(a.handler.validate(&bad.into()).await, ValidationResult::Reject);
        }
        assert_eq!(a.handler.validate(&peer.into()).await, ValidationResult::Accept);
    }

    #[tokio::test]
    async fn test_invalid_key_rejected_and_not_stored() {
        let keys = EonKeys::generate_seeded(3, 2, 5);
        let other = EonKeys::generate_seeded(3, 2, 6);
        let collator = Secp256k1KeyPair::generate();
        let k = setup(&keys, 0, &collator).await;
        let epoch = EpochId::from_u64(1);

        let foreign = other.dkg_result(0, EON);
        let mut kg = EpochKg::new(foreign.clone());
        for i in 0..2 {
            let share = other.dkg_result(i, EON).epoch_secret_key_share(&epoch);
            kg.handle_epoch_secret_key_share(EpochSecretKeyShareMsg {
                eon: EON,
                epoch_id: epoch,
                sender: i,
                share,
            })
            .unwrap();
        }
        let bad = DecryptionKey {
            instance_id: INSTANCE,
            eon: EON,
            epoch_id: epoch,
            key: kg.secret_key(&epoch).unwrap().to_bytes(),
        };

        assert_eq!(k.handler.validate(&bad.clone().into()).await, ValidationResult::Reject);
        let tx = k.db.begin().await;
        assert!(!tx.exists_decryption_key(EON, &epoch).unwrap());
    }

    #[tokio::test]
    async fn test_peer_key_stored_once() {
        let keys = EonKeys::generate_seeded(1, 1, 7);
        let collator = Secp256k1KeyPair::generate();
        let producer = setup(&keys, 0, &collator).await;
        let out = producer
            .handler
            .handle_trigger(&signed_trigger(&collator, 2))
            .await
            .unwrap();
        let P2PMessage::DecryptionKey(key) = out[1].clone() else {
            panic!("expected key");
        };

        let k = setup(&keys, 0, &collator).await;
        assert_eq!(k.handler.validate(&key.clone().into()).await, ValidationResult::Accept);
        assert!(k.handler.handle_key(&key).await.unwrap());
        assert!(!k.handler.handle_key(&key).await.unwrap());
        assert_eq!(k.metrics.decryption_keys_received.get(), 2);
    }

    #[tokio::test]
    async fn test_gossip_trigger_validation() {
        let keys = EonKeys::generate_seeded(3, 2, 8);
        let collator = Secp256k1KeyPair::generate();
        let k = setup(&keys, 0, &collator).await;

        let good: P2PMessage = signed_trigger(&collator, 1).trigger.into();
        let forged: P2PMessage = signed_trigger(&Secp256k1KeyPair::generate(), 1)
            .trigger
            .into();
        assert_eq!(k.handler.validate(&good).await, ValidationResult::Accept);
        assert_eq!(k.handler.validate(&forged).await, ValidationResult::Reject);
    }
}

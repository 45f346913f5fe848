//! Fixtures shared by the integration flows.

use std::sync::Arc;
use std::time::Duration;

use kp_02_storage::{BatchConfigRow, CollatorRow, Database, DkgResultRow, EonRow};
use kp_03_event_syncer::{
    ContractEvent, Contracts, Deployment, Deployments, KeypersConfigsListNewConfig, Log,
};
use kp_05_dkg::testkeygen::EonKeys;
use kp_06_shuttermint::{
    send_shutter_messages, EonStarted, Event, Message, MockMessageSender, MockShuttermintClient,
    PhaseLength, ShuttermintDriver, ShuttermintState, StateConfig,
};
use shared_crypto::{EncryptionKeyPair, Secp256k1KeyPair, ValidatorPublicKey};
use shared_types::{
    Address, BlockNumber, Clock, EonIndex, EpochId, InstanceId, KeyperIndex, MockClock,
};
use tokio::sync::mpsc;

pub const INSTANCE: InstanceId = 42;
pub const EON: EonIndex = 7;
pub const PHASE_LEN: i64 = 30;
/// Consensus height at which eon [`EON`] starts its DKG.
pub const DKG_START_HEIGHT: i64 = 5000;
/// L1 block from which eon [`EON`] is active.
pub const ACTIVATION_BLOCK: BlockNumber = 200;

pub const KEYPER_CONFIG_ADDR: Address = Address([1; 20]);
pub const COLLATOR_CONFIG_ADDR: Address = Address([2; 20]);
pub const KEYPERS_ADDR: Address = Address([3; 20]);
pub const COLLATORS_ADDR: Address = Address([4; 20]);

pub fn deployments(deploy_block: BlockNumber) -> Deployments {
    let deployment = |name: &str, address: Address, events: &[&str]| {
        Deployment::with_events(1, name, address, deploy_block, events)
    };
    Deployments::new(
        1,
        [
            deployment(Contracts::KEYPER_CONFIG, KEYPER_CONFIG_ADDR, &["NewConfig"]),
            deployment(Contracts::COLLATOR_CONFIG, COLLATOR_CONFIG_ADDR, &["NewConfig"]),
            deployment(Contracts::KEYPERS, KEYPERS_ADDR, &["Appended", "Added"]),
            deployment(Contracts::COLLATORS, COLLATORS_ADDR, &["Appended", "Added"]),
        ],
    )
}

/// A keyper `NewConfig` event as the contract would emit it.
pub fn keyper_config_event(
    activation: BlockNumber,
    set_index: u64,
    config_index: u64,
    threshold: u64,
) -> ContractEvent {
    ContractEvent::KeypersConfigsListNewConfig(KeypersConfigsListNewConfig {
        activation_block_number: activation,
        keyper_set_index: set_index,
        keyper_config_index: config_index,
        threshold,
        raw: Log {
            address: Address::ZERO,
            topics: vec![],
            data: vec![],
            block_number: 0,
            log_index: 0,
        },
    })
}

pub fn validator_key(seed: u8) -> ValidatorPublicKey {
    let signing = ed25519_dalek::SigningKey::from_bytes(&[seed; 32]);
    ValidatorPublicKey::from_bytes(signing.verifying_key().to_bytes())
        .expect("ed25519 public keys are valid points")
}

/// Driver for the keyper at `address` over `chain`.
pub fn consensus_driver(
    chain: &Arc<MockShuttermintClient>,
    db: &Database,
    address: Address,
    seed: u8,
) -> ShuttermintDriver {
    let clock: Arc<dyn Clock> = Arc::new(MockClock::default());
    let state = ShuttermintState::new(
        StateConfig {
            address,
            validator_public_key: validator_key(seed),
            encryption_key: EncryptionKeyPair::generate(),
            phase_length: PhaseLength::constant(PHASE_LEN),
        },
        Arc::clone(&clock),
    );
    ShuttermintDriver::new(chain.clone(), db.clone(), state, clock)
}

/// One keyper's view of the consensus chain: database, driver and the
/// outbound queue flushed into a channel.
pub struct ConsensusKeyper {
    pub key: Secp256k1KeyPair,
    pub db: Database,
    pub driver: ShuttermintDriver,
    sender: MockMessageSender,
    outbox: mpsc::UnboundedReceiver<Message>,
}

impl ConsensusKeyper {
    pub fn new(chain: &Arc<MockShuttermintClient>, seed: u8) -> Self {
        let key = Secp256k1KeyPair::generate();
        let db = Database::in_memory();
        let driver = consensus_driver(chain, &db, key.address(), seed);
        let (sender, outbox) = MockMessageSender::new();
        Self {
            key,
            db,
            driver,
            sender,
            outbox,
        }
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }

    /// Send everything queued and return it in order.
    pub async fn flush(&mut self) -> Vec<Message> {
        send_shutter_messages(&self.db, &self.sender, None)
            .await
            .expect("mock sender never fails");
        std::iter::from_fn(|| self.outbox.try_recv().ok()).collect()
    }
}

/// Sync every keyper to the chain head, then deliver what they queued at
/// the next height, the way the shutter application executes it. Returns
/// the new head.
pub async fn consensus_round(
    chain: &MockShuttermintClient,
    keypers: &mut [ConsensusKeyper],
    head: i64,
) -> i64 {
    for keyper in keypers.iter() {
        keyper.driver.sync().await.unwrap();
    }
    let mut delivered = false;
    for keyper in keypers.iter_mut() {
        let sender = keyper.address();
        for msg in keyper.flush().await {
            chain.deliver(sender, head + 1, &msg);
            delivered = true;
        }
    }
    if delivered {
        head + 1
    } else {
        head
    }
}

/// Batch config 1 with every keyper of `keypers` and threshold `threshold`,
/// check-ins, then every phase of the DKG for [`EON`]. Returns the head.
pub async fn run_eon_dkg(
    chain: &MockShuttermintClient,
    keypers: &mut [ConsensusKeyper],
    threshold: u64,
) -> i64 {
    let members: Vec<Address> = keypers.iter().map(ConsensusKeyper::address).collect();
    chain.deliver(
        members[0],
        10,
        &Message::BatchConfig {
            activation_block_number: ACTIVATION_BLOCK,
            keypers: members,
            threshold,
            keyper_config_index: 1,
        },
    );
    let mut head = consensus_round(chain, keypers, 10).await;
    head = consensus_round(chain, keypers, head).await;

    // dealing: commitments and encrypted evals
    assert!(head < DKG_START_HEIGHT);
    chain.add_event(&Event::EonStarted(EonStarted {
        height: DKG_START_HEIGHT,
        eon: EON,
        activation_block_number: ACTIVATION_BLOCK,
        config_index: 1,
    }));
    head = consensus_round(chain, keypers, DKG_START_HEIGHT).await;
    assert!(head > DKG_START_HEIGHT, "keypers did not deal");
    head = consensus_round(chain, keypers, head).await;

    // accusing, apologizing, finalized
    for phase in 1..=4 {
        let height = DKG_START_HEIGHT + phase * PHASE_LEN;
        assert!(head < height);
        chain.set_head(height);
        head = consensus_round(chain, keypers, height).await;
    }
    head
}

pub fn keyper_address(index: KeyperIndex) -> Address {
    Address([0xa0 + index as u8; 20])
}

/// Batch config 1 with every keyper of `keys`, eon [`EON`] with a finished
/// DKG as seen by keyper `index`, and `collator` active from block 0.
pub async fn seed_eon(db: &Database, keys: &EonKeys, index: KeyperIndex, collator: &Secp256k1KeyPair) {
    let mut tx = db.begin().await;
    tx.insert_batch_config(&BatchConfigRow {
        config_index: 1,
        height: 3,
        activation_block: 200,
        threshold: keys.threshold,
        keypers: (0..keys.num_keypers).map(keyper_address).collect(),
        started: true,
    })
    .unwrap();
    tx.insert_eon(&EonRow {
        eon: EON,
        start_height: 5000,
        activation_block: 200,
        config_index: 1,
    })
    .unwrap();
    tx.insert_dkg_result(&DkgResultRow {
        eon: EON,
        success: true,
        error: None,
        pure_result: keys.dkg_result(index, EON).encode().unwrap(),
    })
    .unwrap();
    tx.insert_collator(&CollatorRow {
        activation_block: 0,
        collator: collator.address(),
    })
    .unwrap();
    tx.commit().unwrap();
}

/// Poll until a decryption key for `(EON, epoch)` is stored.
pub async fn wait_for_key(db: &Database, epoch: &EpochId) -> Vec<u8> {
    for _ in 0..300 {
        if let Some(key) = db.begin().await.get_decryption_key(EON, epoch).unwrap() {
            return key;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no decryption key for epoch {epoch}");
}

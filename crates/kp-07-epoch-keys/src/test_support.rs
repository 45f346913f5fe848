//! Fixtures shared by the unit tests.

use kp_02_storage::{BatchConfigRow, CollatorRow, Database, DkgResultRow, EonRow};
use kp_05_dkg::testkeygen::EonKeys;
use shared_crypto::Secp256k1KeyPair;
use shared_types::{Address, EonIndex, InstanceId, KeyperIndex};

pub const INSTANCE: InstanceId = 42;
pub const EON: EonIndex = 7;

pub fn keyper_address(i: u8) -> Address {
    Address([0xa0 + i; 20])
}

/// Store batch config 1 (all keypers of `keys`, active from block 200),
/// eon 7 on top of it with a finished DKG as seen by keyper `index`, and
/// `collator` as the collator from block 0 on.
pub async fn seed_eon(db: &Database, keys: &EonKeys, index: KeyperIndex, collator: &Secp256k1KeyPair) {
    let mut tx = db.begin().await;
    tx.insert_batch_config(&BatchConfigRow {
        config_index: 1,
        height: 3,
        activation_block: 200,
        threshold: keys.threshold,
        keypers: (0..keys.num_keypers as u8).map(keyper_address).collect(),
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

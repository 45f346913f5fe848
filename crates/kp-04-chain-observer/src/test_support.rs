//! Fixtures shared by the unit tests.

use std::sync::Arc;

use kp_03_event_syncer::{
    CollatorConfigsListNewConfig, ContractEvent, Contracts, Deployment, Deployments, EventKind,
    KeypersConfigsListNewConfig, Log, MockEthereumClient,
};
use shared_types::Address;

pub const KEYPER_CONFIG_ADDR: Address = Address([1; 20]);
pub const COLLATOR_CONFIG_ADDR: Address = Address([2; 20]);
pub const KEYPERS_ADDR: Address = Address([3; 20]);
pub const COLLATORS_ADDR: Address = Address([4; 20]);

pub fn contracts(client: Arc<MockEthereumClient>, deploy_block: u64) -> Contracts {
    let deployment = |name: &str, address: Address, events: &[&str]| {
        Deployment::with_events(1, name, address, deploy_block, events)
    };
    Contracts::new(
        client,
        Deployments::new(
            1,
            [
                deployment(Contracts::KEYPER_CONFIG, KEYPER_CONFIG_ADDR, &["NewConfig"]),
                deployment(Contracts::COLLATOR_CONFIG, COLLATOR_CONFIG_ADDR, &["NewConfig"]),
                deployment(Contracts::KEYPERS, KEYPERS_ADDR, &["Appended", "Added"]),
                deployment(Contracts::COLLATORS, COLLATORS_ADDR, &["Appended", "Added"]),
            ],
        ),
    )
    .unwrap()
}

fn placeholder_log() -> Log {
    Log {
        address: Address::ZERO,
        topics: vec![],
        data: vec![],
        block_number: 0,
        log_index: 0,
    }
}

/// A decoded keyper `NewConfig` event as the syncer would deliver it.
pub fn keyper_config_event(
    activation: u64,
    set_index: u64,
    config_index: u64,
    threshold: u64,
    block: u64,
) -> ContractEvent {
    let event = ContractEvent::KeypersConfigsListNewConfig(KeypersConfigsListNewConfig {
        activation_block_number: activation,
        keyper_set_index: set_index,
        keyper_config_index: config_index,
        threshold,
        raw: placeholder_log(),
    });
    let log = event.to_log(KEYPER_CONFIG_ADDR, block, 0);
    EventKind::KeypersConfigsListNewConfig
        .decode(&log)
        .unwrap()
}

/// A decoded collator `NewConfig` event.
pub fn collator_config_event(activation: u64, set_index: u64, block: u64) -> ContractEvent {
    let event = ContractEvent::CollatorConfigsListNewConfig(CollatorConfigsListNewConfig {
        activation_block_number: activation,
        collator_set_index: set_index,
        collator_config_index: set_index,
        raw: placeholder_log(),
    });
    let log = event.to_log(COLLATOR_CONFIG_ADDR, block, 0);
    EventKind::CollatorConfigsListNewConfig
        .decode(&log)
        .unwrap()
}

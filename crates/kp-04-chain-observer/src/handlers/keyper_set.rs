//! `KeypersConfigsList.NewConfig` → keyper set row.

use async_trait::async_trait;
use kp_01_retry::RetryOptions;
use kp_02_storage::Tx;
use kp_03_event_syncer::{AddrsSeq, ContractEvent, SyncerError};
use shared_types::{KeyperSet, Shutdown};
use tracing::info;

use crate::error::{ObserverError, ObserverResult};
use crate::handlers::{check_activation_block, retry_get_addrs};
use crate::ports::inbound::{Effect, EventHandler};

/// Stores every new keyper configuration with its member addresses.
#[derive(Debug, Clone)]
pub struct KeyperSetHandler {
    keypers: AddrsSeq,
    retry: RetryOptions<SyncerError>,
}

impl KeyperSetHandler {
    pub fn new(keypers: AddrsSeq) -> Self {
        Self {
            keypers,
            retry: RetryOptions::default().label("keypers.get_addrs"),
        }
    }

    pub fn with_retry(mut self, retry: RetryOptions<SyncerError>) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl EventHandler for KeyperSetHandler {
    async fn handle(&self, shutdown: &Shutdown, event: &ContractEvent) -> ObserverResult<Effect> {
        let ContractEvent::KeypersConfigsListNewConfig(event) = event else {
            return Err(ObserverError::InvalidEvent(format!(
                "keyper set handler got {} event",
                event.kind()
            )));
        };
        info!(
            block = event.raw.block_number,
            keyper_config_index = event.keyper_config_index,
            activation_block = event.activation_block_number,
            "[chain-observer] handling NewConfig event from keypers config contract"
        );
        check_activation_block(event.activation_block_number)?;

        let keypers =
            retry_get_addrs(shutdown, &self.keypers, event.keyper_set_index, &self.retry).await?;
        let set = KeyperSet {
            index: event.keyper_config_index,
            activation_block: event.activation_block_number,
            keypers,
            threshold: event.threshold,
        };
        Ok(Box::new(move |tx: &mut Tx| -> ObserverResult<()> {
            tx.insert_keyper_set(&set)?;
            Ok(())
        }))
    }
}

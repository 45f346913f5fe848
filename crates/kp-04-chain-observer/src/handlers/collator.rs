//! `CollatorConfigsList.NewConfig` → collator row.

use async_trait::async_trait;
use kp_01_retry::RetryOptions;
use kp_02_storage::{CollatorRow, Tx};
use kp_03_event_syncer::{AddrsSeq, ContractEvent, SyncerError};
use shared_types::Shutdown;
use tracing::info;

use crate::error::{ObserverError, ObserverResult};
use crate::handlers::{check_activation_block, retry_get_addrs};
use crate::ports::inbound::{Effect, EventHandler};

/// Stores the single collator of every new collator configuration.
#[derive(Debug, Clone)]
pub struct CollatorHandler {
    collators: AddrsSeq,
    retry: RetryOptions<SyncerError>,
}

impl CollatorHandler {
    pub fn new(collators: AddrsSeq) -> Self {
        Self {
            collators,
            retry: RetryOptions::default().label("collators.get_addrs"),
        }
    }

    pub fn with_retry(mut self, retry: RetryOptions<SyncerError>) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl EventHandler for CollatorHandler {
    async fn handle(&self, shutdown: &Shutdown, event: &ContractEvent) -> ObserverResult<Effect> {
        let ContractEvent::CollatorConfigsListNewConfig(event) = event else {
            return Err(ObserverError::InvalidEvent(format!(
                "collator handler got {} event",
                event.kind()
            )));
        };
        info!(
            block = event.raw.block_number,
            collator_config_index = event.collator_config_index,
            activation_block = event.activation_block_number,
            "[chain-observer] handling NewConfig event from collator config contract"
        );
        check_activation_block(event.activation_block_number)?;

        let collators =
            retry_get_addrs(shutdown, &self.collators, event.collator_set_index, &self.retry)
                .await?;
        let [collator] = collators.as_slice() else {
            return Err(ObserverError::InvalidEvent(format!(
                "expected exactly one collator in set {}, got {}",
                event.collator_set_index,
                collators.len()
            )));
        };

        let row = CollatorRow {
            activation_block: event.activation_block_number,
            collator: *collator,
        };
        Ok(Box::new(move |tx: &mut Tx| -> ObserverResult<()> {
            tx.insert_collator(&row)?;
            Ok(())
        }))
    }
}

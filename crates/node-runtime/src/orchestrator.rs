//! # Keyper Orchestrator
//!
//! One tick every [`TICK_INTERVAL`]:
//!
//! ```text
//!   1. L1 head ──retry──▶ block
//!   2. shuttermint driver sync
//!   3. one tx: ┬─ schedule next keyper set as BatchConfig message
//!              └─ BlockSeen heartbeat
//!   4. flush outbound queue
//! ```
//!
//! The orchestrator is the only writer of `last_batch_config_sent` and
//! `last_block_seen`.

use std::sync::Arc;
use std::time::Duration;

use keyper_telemetry::KeyperMetrics;
use kp_01_retry::{retry, RetryError, RetryOptions};
use kp_02_storage::{Database, Tx};
use kp_03_event_syncer::{EthereumClient, SyncerError};
use kp_06_shuttermint::{send_shutter_messages, Message, MessageSender, ShuttermintDriver};
use shared_types::{Address, BlockNumber, Clock, Shutdown};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{KeyperError, KeyperResult};

pub const TICK_INTERVAL: Duration = Duration::from_secs(2);

pub struct Orchestrator {
    db: Database,
    ethereum: Arc<dyn EthereumClient>,
    driver: ShuttermintDriver,
    sender: Arc<dyn MessageSender>,
    clock: Arc<dyn Clock>,
    address: Address,
    dkg_start_block_delta: u64,
    retry: RetryOptions<SyncerError>,
    interval: Duration,
    metrics: Option<KeyperMetrics>,
}

impl Orchestrator {
    pub fn new(
        db: Database,
        ethereum: Arc<dyn EthereumClient>,
        driver: ShuttermintDriver,
        sender: Arc<dyn MessageSender>,
        clock: Arc<dyn Clock>,
        address: Address,
        dkg_start_block_delta: u64,
    ) -> Self {
        Self {
            db,
            ethereum,
            driver,
            sender,
            clock,
            address,
            dkg_start_block_delta,
            retry: RetryOptions::default().label("l1 block number"),
            interval: TICK_INTERVAL,
            metrics: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryOptions<SyncerError>) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_metrics(mut self, metrics: KeyperMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Tick until `shutdown` fires or a tick fails fatally.
    pub async fn run(&self, shutdown: &Shutdown) -> KeyperResult<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    info!("[orchestrator] stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }
            match self.tick(shutdown).await {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => warn!(error = %err, "[orchestrator] tick failed, retrying next tick"),
            }
        }
    }

    /// One pass over every responsibility. Returns early without error if
    /// shutdown interrupts the L1 query.
    pub async fn tick(&self, shutdown: &Shutdown) -> KeyperResult<()> {
        let block = match retry(shutdown, &self.retry, || self.ethereum.block_number()).await {
            Ok(block) => block,
            Err(RetryError::Cancelled) => return Ok(()),
            Err(err) => {
                return Err(match err.into_inner() {
                    Some(inner) => KeyperError::Ethereum(inner),
                    None => KeyperError::Config("invalid retry options for l1 block query".into()),
                })
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.l1_block_number.set(block as i64);
        }

        self.driver.sync().await?;

        let mut tx = self.db.begin().await;
        self.handle_on_chain_changes(&mut tx, block)?;
        tx.commit()?;

        send_shutter_messages(&self.db, self.sender.as_ref(), self.metrics.as_ref()).await?;
        Ok(())
    }

    /// React to L1 state as of `block` inside `tx`.
    pub fn handle_on_chain_changes(&self, tx: &mut Tx, block: BlockNumber) -> KeyperResult<()> {
        self.schedule_next_batch_config(tx, block)?;
        self.send_block_seen(tx, block)
    }

    fn schedule_next_batch_config(&self, tx: &mut Tx, block: BlockNumber) -> KeyperResult<()> {
        let Some(latest) = tx.get_latest_batch_config()? else {
            debug!("[orchestrator] no batch config on the consensus chain yet");
            return Ok(());
        };
        let Some(set) = tx.get_keyper_set(latest.config_index + 1)? else {
            return Ok(());
        };
        if tx.get_last_batch_config_sent()? == Some(set.index) {
            return Ok(());
        }
        if block < set.activation_block && set.activation_block - block > self.dkg_start_block_delta {
            debug!(
                config_index = set.index,
                activation_block = set.activation_block,
                block,
                "[orchestrator] too early to propose keyper set"
            );
            return Ok(());
        }

        tx.set_last_batch_config_sent(set.index)?;
        let msg = Message::BatchConfig {
            activation_block_number: set.activation_block,
            keypers: set.keypers.clone(),
            threshold: set.threshold,
            keyper_config_index: set.index,
        };
        tx.schedule_shutter_message(msg.description(), msg.encode()?, self.clock.now())?;
        info!(
            config_index = set.index,
            activation_block = set.activation_block,
            keypers = set.keypers.len(),
            threshold = set.threshold,
            "[orchestrator] scheduled new batch config"
        );
        Ok(())
    }

    fn send_block_seen(&self, tx: &mut Tx, block: BlockNumber) -> KeyperResult<()> {
        let last_seen = tx.get_last_block_seen()?;
        if block <= last_seen {
            return Ok(());
        }
        if tx.count_batch_configs_in_block_range(last_seen, block, &self.address)? == 0 {
            return Ok(());
        }
        let msg = Message::BlockSeen { block_number: block };
        tx.schedule_shutter_message(msg.description(), msg.encode()?, self.clock.now())?;
        tx.set_last_block_seen(block)?;
        info!(block, "[orchestrator] block seen");
        Ok(())
    }
}

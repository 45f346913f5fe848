//! # Eon Key Publisher
//!
//! Every tick, takes the pending eon public keys out of the database, signs
//! each one and broadcasts it on the `eon-public-key` topic.
//!
//! Pending rows are read from a read-only view, broadcast, and deleted in a
//! short transaction once every key went out. No transaction is open while
//! a broadcast is in flight. A failed broadcast leaves all rows in place for
//! the next tick; peers tolerate the repeats.

use std::sync::Arc;
use std::time::Duration;

use keyper_telemetry::KeyperMetrics;
use kp_02_storage::{Database, EonPublicKeyRow};
use shared_bus::{EonPublicKey, Messaging, P2PMessage};
use shared_crypto::Secp256k1KeyPair;
use shared_types::{InstanceId, Shutdown};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::error::{PublisherError, PublisherResult};

/// Time between two polls of the pending table.
pub const PUBLISH_INTERVAL: Duration = Duration::from_secs(2);

pub struct EonKeyPublisher {
    db: Database,
    messaging: Arc<dyn Messaging>,
    signing_key: Arc<Secp256k1KeyPair>,
    instance_id: InstanceId,
    interval: Duration,
    metrics: Option<KeyperMetrics>,
}

impl EonKeyPublisher {
    pub fn new(
        db: Database,
        messaging: Arc<dyn Messaging>,
        signing_key: Arc<Secp256k1KeyPair>,
        instance_id: InstanceId,
    ) -> Self {
        Self {
            db,
            messaging,
            signing_key,
            instance_id,
            interval: PUBLISH_INTERVAL,
            metrics: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_metrics(mut self, metrics: KeyperMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Poll until `shutdown` fires or a fatal error occurs. Other errors
    /// are logged and retried on the next tick.
    pub async fn run(&self, shutdown: &Shutdown) -> PublisherResult<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.interval, "[eon-publisher] started");
        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    info!("[eon-publisher] stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }
            match self.publish_pending().await {
                Ok(_) => {}
                Err(err) if err.is_fatal() => {
                    error!(error = %err, "[eon-publisher] stopped with error");
                    return Err(err);
                }
                Err(err) => error!(error = %err, "[eon-publisher] failed to publish eon public keys"),
            }
        }
    }

    /// Broadcast every pending key. Returns how many were sent.
    pub async fn publish_pending(&self) -> PublisherResult<usize> {
        let pending = self.db.read().get_eon_public_keys()?;
        if pending.is_empty() {
            debug!("[eon-publisher] nothing to publish");
            return Ok(0);
        }

        let own = self.signing_key.address();
        for row in &pending {
            if !row.keypers.contains(&own) {
                return Err(PublisherError::NotAKeyper { eon: row.eon });
            }
            let msg = self.sign(row)?;
            self.messaging.send(P2PMessage::EonPublicKey(msg)).await?;
            if let Some(metrics) = &self.metrics {
                metrics.eon_public_keys_published.inc();
            }
            info!(
                eon = row.eon,
                activation_block = row.activation_block,
                config_index = row.config_index,
                "[eon-publisher] published eon public key"
            );
        }

        let mut tx = self.db.begin().await;
        for row in &pending {
            tx.delete_eon_public_key(row.eon);
        }
        tx.commit()?;
        Ok(pending.len())
    }

    fn sign(&self, row: &EonPublicKeyRow) -> PublisherResult<EonPublicKey> {
        let mut msg = EonPublicKey {
            instance_id: self.instance_id,
            public_key: row.eon_public_key.clone(),
            activation_block: row.activation_block,
            keyper_config_index: row.config_index,
            eon: row.eon,
            signature: Vec::new(),
        };
        msg.sign(&self.signing_key)?;
        Ok(msg)
    }
}

impl std::fmt::Debug for EonKeyPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EonKeyPublisher")
            .field("instance_id", &self.instance_id)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

//! # Chain Observer Service
//!
//! Feeds every update of an [`EventSyncer`] through one database
//! transaction: the handler first gathers what it needs from L1, then its
//! effect and the moved sync cursor are written in one transaction. A
//! committed transaction therefore carries both the handler's effect and
//! the new cursor, or neither. No transaction is open while a handler waits
//! on the network.
//!
//! ## Error policy
//!
//! | Error | Effect |
//! |-------|--------|
//! | `NoHandler` | fatal, cursor stays put |
//! | `DbUpdateFail` | fatal, transaction rolled back |
//! | anything else from a handler | handler writes discarded, logged, cursor advances |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use keyper_telemetry::KeyperMetrics;
use kp_02_storage::Database;
use kp_03_event_syncer::{
    EthereumClient, EventKind, EventSyncUpdate, EventSyncer, EventType, SyncerConfig,
};
use shared_types::{Address, Shutdown};
use tracing::{debug, error, info, warn};

use crate::domain::cursor::{next_cursor, start_position};
use crate::error::{ObserverError, ObserverResult};
use crate::ports::inbound::EventHandler;

type HandlerKey = (Address, EventKind);

pub struct ChainObserver {
    client: Arc<dyn EthereumClient>,
    db: Database,
    events: Vec<EventType>,
    handlers: HashMap<HandlerKey, Arc<dyn EventHandler>>,
    syncer_config: SyncerConfig,
    metrics: Option<KeyperMetrics>,
}

impl ChainObserver {
    pub fn new(client: Arc<dyn EthereumClient>, db: Database) -> Self {
        Self {
            client,
            db,
            events: Vec::new(),
            handlers: HashMap::new(),
            syncer_config: SyncerConfig::default(),
            metrics: None,
        }
    }

    /// Follow `event_type` and route its events to `handler`.
    pub fn register_event(
        mut self,
        event_type: EventType,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        self.handlers
            .insert((event_type.address(), event_type.kind), handler);
        self.follow_event(event_type)
    }

    /// Follow `event_type` without a handler. Its first event stops the
    /// observer with [`ObserverError::NoHandler`].
    pub fn follow_event(mut self, event_type: EventType) -> Self {
        let key = (event_type.address(), event_type.kind);
        if !self
            .events
            .iter()
            .any(|ev| (ev.address(), ev.kind) == key)
        {
            self.events.push(event_type);
        }
        self
    }

    pub fn with_syncer_config(mut self, config: SyncerConfig) -> Self {
        self.syncer_config = config;
        self
    }

    pub fn with_metrics(mut self, metrics: KeyperMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sync until `shutdown` fires (returns `Ok`) or a fatal error occurs.
    pub async fn run(&self, shutdown: &Shutdown) -> ObserverResult<()> {
        let res = self.sync(shutdown).await;
        match res {
            Err(ObserverError::Cancelled) if shutdown.is_triggered() => {
                info!("[chain-observer] stopped");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "[chain-observer] stopped with error");
                Err(err)
            }
            Ok(()) => Ok(()),
        }
    }

    async fn sync(&self, shutdown: &Shutdown) -> ObserverResult<()> {
        let cursor = self.db.read().get_sync_cursor()?;
        let min_deploy_block = self
            .events
            .iter()
            .map(EventType::deploy_block)
            .min()
            .unwrap_or(0);
        let (from_block, from_log_index) = start_position(cursor, min_deploy_block);
        info!(
            from_block,
            from_log_index,
            events = self.events.len(),
            "[chain-observer] starting"
        );

        let syncer = EventSyncer::with_config(
            Arc::clone(&self.client),
            self.syncer_config.clone(),
            self.events.clone(),
            from_block,
            from_log_index,
        );
        let producer = async { syncer.run(shutdown).await.map_err(ObserverError::from) };
        let consumer = self.consume(shutdown, &syncer);
        tokio::try_join!(producer, consumer)?;
        Ok(())
    }

    async fn consume(&self, shutdown: &Shutdown, syncer: &EventSyncer) -> ObserverResult<()> {
        loop {
            let update = syncer.next(shutdown).await?;
            self.handle_update(shutdown, &update).await?;
        }
    }

    /// Apply one update atomically.
    pub async fn handle_update(
        &self,
        shutdown: &Shutdown,
        update: &EventSyncUpdate,
    ) -> ObserverResult<()> {
        // Contract calls happen here, before the transaction is opened.
        let effect = match &update.event {
            None => None,
            Some(event) => {
                let key = (event.raw().address, event.kind());
                let Some(handler) = self.handlers.get(&key) else {
                    error!(
                        event = %event.kind(),
                        address = %event.raw().address,
                        block = update.block_number,
                        "[chain-observer] no handler registered for event"
                    );
                    return Err(ObserverError::NoHandler(event.kind()));
                };
                match handler.handle(shutdown, event).await {
                    Ok(effect) => Some(effect),
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        self.log_skipped(update, &err);
                        None
                    }
                }
            }
        };

        let mut tx = self.db.begin().await;
        if let Some(effect) = effect {
            let savepoint = tx.savepoint();
            if let Err(err) = effect(&mut tx) {
                if err.is_fatal() {
                    return Err(err);
                }
                tx.rollback_to(savepoint);
                self.log_skipped(update, &err);
            }
        }

        let cursor = next_cursor(update);
        tx.update_sync_cursor(cursor)
            .map_err(ObserverError::DbUpdateFail)?;
        tx.commit().map_err(ObserverError::DbUpdateFail)?;

        debug!(
            next_block = cursor.next_block,
            next_log_index = cursor.next_log_index,
            "[chain-observer] cursor advanced"
        );
        if let Some(metrics) = &self.metrics {
            metrics
                .chain_observer_next_block
                .set(i64::try_from(cursor.next_block).unwrap_or(i64::MAX));
        }
        Ok(())
    }

    fn log_skipped(&self, update: &EventSyncUpdate, err: &ObserverError) {
        warn!(
            error = %err,
            event = ?update.event.as_ref().map(|e| e.kind()),
            block = update.block_number,
            log_index = update.log_index,
            "[chain-observer] failed to handle event, skipping"
        );
    }
}

impl fmt::Debug for ChainObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainObserver")
            .field("events", &self.events)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("syncer_config", &self.syncer_config)
            .finish()
    }
}

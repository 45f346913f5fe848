//! # Consensus Driver
//!
//! Pulls committed transactions from the BFT node in height windows and
//! feeds their events through the [`ShuttermintState`] reducer. Each window
//! is applied in one database transaction that also moves the stored sync
//! position, so a crash never applies a window twice.
//!
//! ## Error policy
//!
//! | Error | Effect |
//! |-------|--------|
//! | `EmptyChain` | logged, `sync` returns `Ok` |
//! | `TxCountMismatch`, `CursorMismatch` | fatal |
//! | malformed event | logged, event skipped |
//! | anything else | window rolled back, reducer invalidated, error returned |

use std::sync::Arc;

use keyper_telemetry::KeyperMetrics;
use kp_02_storage::{Database, ShuttermintSyncMeta, Tx};
use shared_types::Clock;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::domain::events::Event;
use crate::domain::state::ShuttermintState;
use crate::error::{DriverError, DriverResult};
use crate::ports::outbound::{ShuttermintClient, TxQuery, TxResult};

/// Heights fetched per window.
pub const PER_QUERY: i64 = 500;
/// Transactions per `tx_search` page.
pub const PER_PAGE: u64 = 100;

pub struct ShuttermintDriver {
    client: Arc<dyn ShuttermintClient>,
    db: Database,
    state: Mutex<ShuttermintState>,
    clock: Arc<dyn Clock>,
    metrics: Option<KeyperMetrics>,
}

impl ShuttermintDriver {
    pub fn new(
        client: Arc<dyn ShuttermintClient>,
        db: Database,
        state: ShuttermintState,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            db,
            state: Mutex::new(state),
            clock,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: KeyperMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Catch up with the chain head.
    pub async fn sync(&self) -> DriverResult<()> {
        let current = self.db.read().get_sync_meta()?.current_block;
        let last = match self.client.last_committed_height().await? {
            Some(height) => height,
            None => {
                info!("[shuttermint] {}", DriverError::EmptyChain);
                return Ok(());
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.shuttermint_height.set(last);
        }
        if current == last {
            debug!(height = current, "[shuttermint] in sync");
            return Ok(());
        }
        if current > last {
            warn!(current, last, "[shuttermint] stored position ahead of the chain");
            return Ok(());
        }
        self.fetch_events(current, last).await
    }

    async fn fetch_events(&self, mut current: i64, last: i64) -> DriverResult<()> {
        if last - current > PER_QUERY {
            info!(current, last, "[shuttermint] starting catch-up");
        }
        while current < last {
            let new_current = current.saturating_add(PER_QUERY).min(last);
            let query = TxQuery {
                min_height: current + 1,
                max_height: new_current,
            };
            let txs = self.fetch_all(&query).await?;
            if last - current > PER_QUERY {
                info!(
                    current,
                    new_current,
                    last,
                    txs = txs.len(),
                    "[shuttermint] catching up"
                );
            }
            self.handle_transactions(current, new_current, last, txs)
                .await?;
            current = new_current;
        }
        Ok(())
    }

    /// Every transaction matching `query`, in chain order.
    async fn fetch_all(&self, query: &TxQuery) -> DriverResult<Vec<TxResult>> {
        let mut txs = Vec::new();
        let mut page = 1;
        let total = loop {
            let result = self.client.tx_search(query, page, PER_PAGE).await?;
            let fetched = result.txs.len();
            txs.extend(result.txs);
            if page * PER_PAGE >= result.total_count || fetched == 0 {
                break result.total_count;
            }
            page += 1;
        };
        let observed = txs.len() as u64;
        if observed != total {
            error!(%query, declared = total, observed, "[shuttermint] transaction count mismatch");
            return Err(DriverError::TxCountMismatch {
                declared: total,
                observed,
            });
        }
        Ok(txs)
    }

    async fn handle_transactions(
        &self,
        old_current: i64,
        new_current: i64,
        last: i64,
        txs: Vec<TxResult>,
    ) -> DriverResult<()> {
        let mut state = self.state.lock().await;
        let mut tx = self.db.begin().await;
        let res = self
            .apply(&mut state, &mut tx, old_current, new_current, last, &txs)
            .and_then(|()| tx.commit().map_err(DriverError::from));
        if let Err(err) = &res {
            error!(
                error = %err,
                from = old_current + 1,
                to = new_current,
                "[shuttermint] failed to apply transactions, rolled back"
            );
            state.invalidate();
        }
        res
    }

    fn apply(
        &self,
        state: &mut ShuttermintState,
        tx: &mut Tx,
        old_current: i64,
        new_current: i64,
        last: i64,
        txs: &[TxResult],
    ) -> DriverResult<()> {
        let stored = tx.get_sync_meta()?.current_block;
        if stored != old_current {
            return Err(DriverError::CursorMismatch {
                stored,
                expected: old_current,
            });
        }
        state.load(tx)?;
        tx.set_sync_meta(&ShuttermintSyncMeta {
            current_block: new_current,
            last_committed_height: last,
            sync_timestamp: self.clock.now(),
        })?;

        for result in txs {
            state.shift_phases(tx, result.height)?;
            for raw in &result.events {
                let event = match Event::from_abci(raw, result.height) {
                    Ok(event) => event,
                    Err(err) => {
                        error!(
                            error = %err,
                            height = result.height,
                            kind = %raw.kind,
                            "[shuttermint] cannot decode event, skipping"
                        );
                        continue;
                    }
                };
                state.handle_event(tx, &event)?;
            }
        }
        state.shift_phases(tx, new_current)?;
        state.before_save(tx)?;
        state.save(tx)
    }
}

impl std::fmt::Debug for ShuttermintDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShuttermintDriver").finish_non_exhaustive()
    }
}

//! Inbound ports: what the observer calls for every event.

use async_trait::async_trait;
use kp_02_storage::Tx;
use kp_03_event_syncer::ContractEvent;
use shared_types::Shutdown;

use crate::error::ObserverResult;

/// Database effect of one event, applied inside the observer's transaction.
pub type Effect = Box<dyn FnOnce(&mut Tx) -> ObserverResult<()> + Send>;

/// Turns one L1 event into a database [`Effect`].
///
/// `handle` runs before the observer opens its transaction, so it may do
/// network I/O (contract calls, retries) without blocking other writers.
/// The returned effect must only touch `tx`; the observer commits it
/// together with the advanced sync cursor.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, shutdown: &Shutdown, event: &ContractEvent) -> ObserverResult<Effect>;
}

//! Handlers for the L1 events the keyper follows.

pub mod collator;
pub mod keyper_set;

use kp_01_retry::{retry, RetryOptions};
use kp_03_event_syncer::{AddrsSeq, SyncerError};
use shared_types::{Address, Shutdown};

use crate::error::{ObserverError, ObserverResult};

/// Read address set `n` from `addrs_seq`, retrying transient failures.
///
/// Reads happen at the latest block rather than the event's block: sets
/// cannot change retroactively, so no archive node is needed.
pub async fn retry_get_addrs(
    shutdown: &Shutdown,
    addrs_seq: &AddrsSeq,
    n: u64,
    opts: &RetryOptions<SyncerError>,
) -> ObserverResult<Vec<Address>> {
    retry(shutdown, opts, || addrs_seq.get_addrs(n))
        .await
        .map_err(|e| ObserverError::from(SyncerError::from(e)))
}

/// Activation blocks are stored as signed 64-bit integers.
pub(crate) fn check_activation_block(activation_block: u64) -> ObserverResult<()> {
    if i64::try_from(activation_block).is_err() {
        return Err(ObserverError::InvalidEvent(format!(
            "activation block number {activation_block} from config contract would overflow int64"
        )));
    }
    Ok(())
}

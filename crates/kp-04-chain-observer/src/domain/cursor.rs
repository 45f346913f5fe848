//! Where the observer resumes.

use kp_02_storage::SyncCursor;
use kp_03_event_syncer::EventSyncUpdate;
use shared_types::BlockNumber;

/// First `(block, log_index)` to scan.
///
/// A cursor at or past the earliest deploy block wins, including its log
/// index. Otherwise scanning starts at the beginning of `min_deploy_block`.
pub fn start_position(
    cursor: Option<SyncCursor>,
    min_deploy_block: BlockNumber,
) -> (BlockNumber, u64) {
    let cursor = cursor.unwrap_or_default();
    if cursor.next_block >= min_deploy_block {
        (cursor.next_block, cursor.next_log_index)
    } else {
        (min_deploy_block, 0)
    }
}

/// Cursor to persist once `update` has been applied.
pub fn next_cursor(update: &EventSyncUpdate) -> SyncCursor {
    let (next_block, next_log_index) = update.next_cursor();
    SyncCursor::new(next_block, next_log_index)
}

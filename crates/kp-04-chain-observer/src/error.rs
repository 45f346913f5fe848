//! Chain observer errors.

use kp_02_storage::StorageError;
use kp_03_event_syncer::{EventKind, SyncerError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObserverError {
    /// An event arrived for which no handler is registered.
    #[error("no handler registered for event {0}")]
    NoHandler(EventKind),

    /// The sync cursor could not be written or the transaction not committed.
    #[error("failed to update last synced event: {0}")]
    DbUpdateFail(StorageError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("event syncer error: {0}")]
    Syncer(SyncerError),

    /// The event is well-formed but its content is unusable.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("chain observer cancelled")]
    Cancelled,
}

impl ObserverError {
    /// Errors that stop the observer. Everything else is logged by the
    /// dispatch loop and the event is skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ObserverError::NoHandler(_) | ObserverError::DbUpdateFail(_) | ObserverError::Cancelled
        )
    }
}

impl From<SyncerError> for ObserverError {
    fn from(err: SyncerError) -> Self {
        match err {
            SyncerError::Cancelled => ObserverError::Cancelled,
            other => ObserverError::Syncer(other),
        }
    }
}

pub type ObserverResult<T> = Result<T, ObserverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ObserverError::NoHandler(EventKind::AddrsSeqAdded).is_fatal());
        assert!(ObserverError::DbUpdateFail(StorageError::Backend("x".into())).is_fatal());
        assert!(ObserverError::Cancelled.is_fatal());
        assert!(!ObserverError::InvalidEvent("x".into()).is_fatal());
        assert!(!ObserverError::Storage(StorageError::Backend("x".into())).is_fatal());
        assert!(!ObserverError::Syncer(SyncerError::Rpc("x".into())).is_fatal());
    }

    #[test]
    fn test_syncer_cancellation_maps_to_cancelled() {
        assert_eq!(
            ObserverError::from(SyncerError::Cancelled),
            ObserverError::Cancelled
        );
    }
}

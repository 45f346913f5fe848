//! Event syncer errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncerError {
    #[error("event syncer already running")]
    AlreadyRunning,

    #[error("event syncer cancelled")]
    Cancelled,

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("failed to unpack log of {event} event: {message}")]
    Decode { event: &'static str, message: String },

    #[error("abi error: {0}")]
    Abi(String),

    #[error("deployment error: {0}")]
    Deployment(String),

    #[error("contract call failed: {0}")]
    Call(String),

    #[error("event channel closed")]
    ChannelClosed,
}

impl SyncerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncerError::Cancelled)
    }
}

pub type SyncerResult<T> = Result<T, SyncerError>;

impl From<kp_01_retry::RetryError<SyncerError>> for SyncerError {
    fn from(err: kp_01_retry::RetryError<SyncerError>) -> Self {
        match err {
            kp_01_retry::RetryError::Cancelled => SyncerError::Cancelled,
            kp_01_retry::RetryError::InvalidOptions(msg) => SyncerError::Rpc(msg),
            other => other.into_inner().unwrap_or(SyncerError::Cancelled),
        }
    }
}

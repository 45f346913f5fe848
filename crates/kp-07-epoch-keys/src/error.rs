//! Epoch key errors.

use kp_02_storage::StorageError;
use kp_05_dkg::DkgError;
use shared_bus::BusError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EpochKeyError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A stored DKG result or share could not be decoded.
    #[error("dkg error: {0}")]
    Dkg(#[from] DkgError),

    #[error("gossip error: {0}")]
    Bus(#[from] BusError),

    /// The service consuming submitted triggers is gone.
    #[error("trigger queue closed")]
    QueueClosed,

    #[error("trigger queue full")]
    QueueFull,
}

impl EpochKeyError {
    /// Errors after which the service cannot make progress.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EpochKeyError::Bus(BusError::Closed))
    }
}

pub type EpochKeyResult<T> = Result<T, EpochKeyError>;

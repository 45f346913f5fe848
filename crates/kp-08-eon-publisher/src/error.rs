//! Eon publisher errors.

use kp_02_storage::StorageError;
use shared_bus::BusError;
use shared_crypto::CryptoError;
use shared_types::EonIndex;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublisherError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to broadcast eon public key: {0}")]
    Bus(#[from] BusError),

    #[error("failed to sign eon public key: {0}")]
    Signing(#[from] CryptoError),

    /// A pending key was generated for a keyper set without this node.
    /// The reducer only queues keys of its own eons, so this is a bug.
    #[error("own keyper index not found for eon {eon}")]
    NotAKeyper { eon: EonIndex },
}

impl PublisherError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PublisherError::NotAKeyper { .. } | PublisherError::Bus(BusError::Closed)
        )
    }
}

pub type PublisherResult<T> = Result<T, PublisherError>;

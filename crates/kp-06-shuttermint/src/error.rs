//! Shuttermint errors.

use kp_02_storage::StorageError;
use kp_05_dkg::DkgError;
use shared_crypto::CryptoError;
use thiserror::Error;

/// Failures talking to the BFT node.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("shuttermint rpc error: {0}")]
    Rpc(String),

    #[error("unexpected shuttermint response: {0}")]
    Decode(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Errors of the consensus driver and the reducer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The chain has no committed block yet. The driver logs this and
    /// returns cleanly.
    #[error("empty shuttermint blockchain")]
    EmptyChain,

    #[error("fetched {observed} shuttermint transactions, node declared {declared}")]
    TxCountMismatch { declared: u64, observed: u64 },

    #[error("wrong current block stored in database: stored={stored} expected={expected}")]
    CursorMismatch { stored: i64, expected: i64 },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("dkg error: {0}")]
    Dkg(#[from] DkgError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// A reducer invariant does not hold, for example an eon whose
    /// batch config is unknown.
    #[error("inconsistent state: {0}")]
    Inconsistent(String),
}

impl DriverError {
    /// Invariant violations the process must not try to recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DriverError::TxCountMismatch { .. } | DriverError::CursorMismatch { .. }
        )
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Errors of the outbound message path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SenderError {
    /// The chain answered with a non-zero result code.
    #[error("remote error: {message}")]
    Remote { message: String, retriable: bool },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("signing failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("codec error: {0}")]
    Codec(String),
}

impl SenderError {
    /// Whether sending the same message again may succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            SenderError::Remote { retriable, .. } => *retriable,
            SenderError::Client(_) => true,
            SenderError::Storage(_) | SenderError::Crypto(_) | SenderError::Codec(_) => false,
        }
    }
}

pub type SenderResult<T> = Result<T, SenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_violations_are_fatal() {
        assert!(DriverError::TxCountMismatch {
            declared: 3,
            observed: 2
        }
        .is_fatal());
        assert!(DriverError::CursorMismatch {
            stored: 1,
            expected: 2
        }
        .is_fatal());
        assert!(!DriverError::EmptyChain.is_fatal());
        assert!(!DriverError::Client(ClientError::Rpc("timeout".into())).is_fatal());
    }

    #[test]
    fn test_sender_retry_classification() {
        let check_tx = SenderError::Remote {
            message: "checktx: mempool full".into(),
            retriable: true,
        };
        let deliver_tx = SenderError::Remote {
            message: "delivertx: bad message".into(),
            retriable: false,
        };
        assert!(check_tx.is_retriable());
        assert!(!deliver_tx.is_retriable());
        assert!(SenderError::Client(ClientError::Rpc("reset".into())).is_retriable());
        assert!(!SenderError::Codec("x".into()).is_retriable());
    }
}

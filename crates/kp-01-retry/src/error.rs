//! Retry outcome errors.

use thiserror::Error;

/// Why a retried operation did not produce a value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Shutdown was requested before a call succeeded.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation failed with an error classified as terminal.
    #[error("stopped on non-retriable error: {0}")]
    Stopped(E),

    /// All attempts failed; carries the error of the last attempt.
    #[error("giving up after {attempts} attempts: {last}")]
    Exhausted { attempts: u64, last: E },

    /// Invalid options, e.g. a multiplier below 1.0.
    #[error("invalid retry options: {0}")]
    InvalidOptions(String),
}

impl<E> RetryError<E> {
    /// True if the error was caused by shutdown.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled)
    }

    /// The error returned by the operation itself, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Stopped(e) | RetryError::Exhausted { last: e, .. } => Some(e),
            RetryError::Cancelled | RetryError::InvalidOptions(_) => None,
        }
    }
}

pub type RetryResult<T, E> = Result<T, RetryError<E>>;

//! # Error Types
//!
//! Parsing errors for the primitive types.

use thiserror::Error;

/// Errors raised while decoding primitive types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// Input was not valid hex.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Input had the wrong length.
    #[error("Invalid length for {kind}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Value does not fit into the target integer type.
    #[error("Value out of range: {0}")]
    OutOfRange(String),
}

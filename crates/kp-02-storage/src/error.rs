//! Storage errors.

use thiserror::Error;

/// Errors raised by the storage layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backing store failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A row could not be encoded or decoded.
    #[error("row codec error in table {table}: {message}")]
    Codec { table: &'static str, message: String },

    /// A required row does not exist.
    #[error("{table} row not found: {key}")]
    NotFound { table: &'static str, key: String },

    /// A row that may only be written once already exists.
    #[error("{table} row already exists: {key}")]
    AlreadyExists { table: &'static str, key: String },

    /// Writes were made through a read-only view.
    #[error("cannot commit {0} writes from a read-only view")]
    ReadOnly(usize),

    /// The database was created with a different schema.
    #[error("schema version mismatch: database has {found}, expected {expected}")]
    SchemaMismatch { found: String, expected: String },
}

impl StorageError {
    /// True if this is a missing row.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

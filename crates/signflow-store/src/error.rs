//! Errors raised by document and task stores.

use signflow_core::{CoreError, LedgerError};
use thiserror::Error;

/// Failure of a store read or commit.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Embed serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Document or task not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The sequential gate refused the change.
    #[error("ledger rejected change: {0}")]
    Ledger(#[from] LedgerError),

    /// A uniqueness constraint was violated (duplicate signer, duplicate order).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A persisted row that no longer parses (unknown status, bad id).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Schema missing, newer than supported, or failed to upgrade.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for StoreError {
    fn from(e: CoreError) -> Self {
        StoreError::InvalidData(e.to_string())
    }
}

/// Result alias for [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;

//! Error types for the workflow.

use signflow_composite::CompositeError;
use signflow_core::{DocumentStatus, LedgerError, TaskId};
use signflow_store::{BlobError, StoreError};
use thiserror::Error;

/// Errors returned by [`Workflow`](crate::Workflow) operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The requester may not perform this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A lower-order signer has not signed yet.
    #[error("out of order: order {order} waits on order {blocking}")]
    OutOfOrder { order: u32, blocking: u32 },

    #[error("task {0} is already resolved")]
    AlreadyResolved(TaskId),

    /// The document was rejected or completed; nothing more can be signed.
    #[error("document is closed ({0})")]
    DocumentClosed(DocumentStatus),

    /// The signature being applied could not be drawn.
    #[error("compositing failed: {0}")]
    Compositing(#[from] CompositeError),

    #[error("storage error: {0}")]
    Store(StoreError),

    #[error("blob store error: {0}")]
    Blob(#[from] BlobError),

    #[error("signer directory error: {0}")]
    Directory(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A background task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<LedgerError> for WorkflowError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::AlreadyResolved(id) => WorkflowError::AlreadyResolved(id),
            LedgerError::OutOfOrder { order, blocking } => {
                WorkflowError::OutOfOrder { order, blocking }
            }
            LedgerError::DocumentClosed(status) => WorkflowError::DocumentClosed(status),
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(e: StoreError) -> Self {
        match e {
            // A commit can still lose the gate to a concurrent writer.
            StoreError::Ledger(ledger) => ledger.into(),
            StoreError::NotFound(what) => WorkflowError::NotFound(what),
            other => WorkflowError::Store(other),
        }
    }
}

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

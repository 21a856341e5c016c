//! Error types for SignFlow core.

use thiserror::Error;

use crate::document::DocumentStatus;
use crate::types::TaskId;

/// Reasons a signing task may not leave `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("task {0} is already resolved")]
    AlreadyResolved(TaskId),

    #[error("task at order {order} is blocked by unsigned order {blocking}")]
    OutOfOrder { order: u32, blocking: u32 },

    #[error("document is closed with status {0}")]
    DocumentClosed(DocumentStatus),
}

/// Structural errors in core values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("unknown document status: {0}")]
    UnknownDocumentStatus(String),

    #[error("unknown task status: {0}")]
    UnknownTaskStatus(String),

    #[error("invalid placement: {0}")]
    InvalidPlacement(String),
}

//! Error types for the compositing engine.

use std::fmt;

use signflow_core::CoreError;
use thiserror::Error;

/// Errors that can occur while compositing.
#[derive(Debug, Error)]
pub enum CompositeError {
    /// The base64 payload could not be decoded.
    #[error("invalid base64 image payload: {0}")]
    Base64(String),

    /// The image bytes could not be decoded as the declared format.
    #[error("image decode error: {0}")]
    ImageDecode(String),

    /// Decoded image exceeds the configured size limit.
    #[error("image payload is {size} bytes, limit is {limit}")]
    ImageTooLarge { size: usize, limit: usize },

    /// The placement is structurally invalid.
    #[error("invalid placement: {0}")]
    Placement(#[from] CoreError),

    /// The placement names a page the document does not have.
    #[error("page {page} out of range, document has {pages} pages")]
    PageOutOfRange { page: u32, pages: usize },

    /// PDF parse, edit, or serialization failure.
    #[error("pdf error: {0}")]
    Pdf(String),
}

impl From<lopdf::Error> for CompositeError {
    fn from(e: lopdf::Error) -> Self {
        CompositeError::Pdf(e.to_string())
    }
}

/// A historical embed that could not be redrawn.
///
/// Non-fatal: the composite is still produced without that image, and the
/// stored embed itself is untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayWarning {
    /// Position of the embed in the replay log.
    pub index: usize,
    /// Target page of the embed.
    pub page: u32,
    /// When the embed was originally applied (Unix ms).
    pub applied_at: i64,
    /// Why it was skipped.
    pub reason: String,
}

impl fmt::Display for ReplayWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "embed #{} on page {} (applied at {}) skipped: {}",
            self.index, self.page, self.applied_at, self.reason
        )
    }
}

/// Result type for compositing operations.
pub type Result<T> = std::result::Result<T, CompositeError>;

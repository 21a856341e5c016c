//! Documents and their derived status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::{BlobLocator, DocumentId, UserId};

/// Lifecycle status of a document.
///
/// Never set by hand once tasks exist: it is recomputed from the task set
/// by [`crate::ledger::derive_document_status`] after every task mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    /// No signers attached yet.
    Draft,
    /// Signers attached, none resolved.
    Pending,
    /// At least one signer has signed, but not all.
    Signed,
    /// A signer rejected. Terminal.
    Rejected,
    /// Every signer signed. Terminal.
    Completed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "DRAFT",
            DocumentStatus::Pending => "PENDING",
            DocumentStatus::Signed => "SIGNED",
            DocumentStatus::Rejected => "REJECTED",
            DocumentStatus::Completed => "COMPLETED",
        }
    }

    /// Terminal documents accept no further signing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Rejected | DocumentStatus::Completed)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(DocumentStatus::Draft),
            "PENDING" => Ok(DocumentStatus::Pending),
            "SIGNED" => Ok(DocumentStatus::Signed),
            "REJECTED" => Ok(DocumentStatus::Rejected),
            "COMPLETED" => Ok(DocumentStatus::Completed),
            other => Err(CoreError::UnknownDocumentStatus(other.to_string())),
        }
    }
}

/// An uploaded document moving through the signing chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub description: Option<String>,

    /// The uploaded file. Never changes after creation.
    pub original_blob: BlobLocator,

    /// Latest rendering with every visual signature burned in.
    ///
    /// A cache: it can always be rebuilt from `original_blob` and the
    /// embeds stored on the signed tasks.
    pub composite_blob: Option<BlobLocator>,

    pub file_name: String,
    pub file_size: u64,
    pub status: DocumentStatus,
    pub created_by: UserId,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Document {
    /// The blob a download should serve: the composite if one exists.
    pub fn current_blob(&self) -> &BlobLocator {
        self.composite_blob.as_ref().unwrap_or(&self.original_blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            DocumentStatus::Draft,
            DocumentStatus::Pending,
            DocumentStatus::Signed,
            DocumentStatus::Rejected,
            DocumentStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<DocumentStatus>().unwrap(), status);
        }
        assert!("ARCHIVED".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(DocumentStatus::Rejected.is_terminal());
        assert!(DocumentStatus::Completed.is_terminal());
        assert!(!DocumentStatus::Signed.is_terminal());
        assert!(!DocumentStatus::Draft.is_terminal());
    }

    #[test]
    fn test_status_serde_matches_storage_form() {
        let json = serde_json::to_string(&DocumentStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
    }
}

//! Signing tasks and the embeds they carry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::{DocumentId, TaskId, UserId};

/// Resolution state of a single signing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Signed,
    Rejected,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Signed => "SIGNED",
            TaskStatus::Rejected => "REJECTED",
        }
    }

    /// Transitions are monotone: only `Pending` may move, and only forward.
    pub fn can_become(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Signed) | (TaskStatus::Pending, TaskStatus::Rejected)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "SIGNED" => Ok(TaskStatus::Signed),
            "REJECTED" => Ok(TaskStatus::Rejected),
            other => Err(CoreError::UnknownTaskStatus(other.to_string())),
        }
    }
}

/// Where a signature image lands on the page.
///
/// Coordinates use a top-left origin in the page's rendered units; `page`
/// is 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub page: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Placement {
    /// Reject placements no page could hold.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.page == 0 {
            return Err(CoreError::InvalidPlacement("page numbers start at 1".into()));
        }
        let finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(CoreError::InvalidPlacement("non-finite coordinate".into()));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(CoreError::InvalidPlacement(format!(
                "size {}x{} must be positive",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// A visual signature as persisted on its task.
///
/// Self-describing so it can be replayed onto the original document by any
/// later compositing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEmbed {
    pub position: Placement,
    /// Base64 image payload, optionally a `data:image/...;base64,` URL.
    pub image: String,
    /// When the signature was applied (Unix ms).
    pub applied_at: i64,
}

/// One signer's obligation on one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningTask {
    pub id: TaskId,
    pub document_id: DocumentId,
    pub signer_id: UserId,
    /// Position in the chain, 1-based. Fixed at creation.
    pub order: u32,
    pub status: TaskStatus,
    pub signed_at: Option<i64>,
    pub embed: Option<StoredEmbed>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SigningTask {
    /// Create a fresh pending task.
    pub fn new(document_id: DocumentId, signer_id: UserId, order: u32, now: i64) -> Self {
        Self {
            id: TaskId::generate(),
            document_id,
            signer_id,
            order,
            status: TaskStatus::Pending,
            signed_at: None,
            embed: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

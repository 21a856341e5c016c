//! Store trait: the abstract interface for document and ledger persistence.
//!
//! This trait allows the workflow to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::collections::HashSet;

use async_trait::async_trait;
use signflow_core::{
    apply_rejected, apply_signed, check_transition, derive_document_status, orders_are_contiguous,
    BlobLocator, Document, DocumentId, SigningTask, StoredEmbed, TaskId, UserId,
};

use crate::error::{Result, StoreError};

/// How a task is being resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Signed, with a visual embed or as a plain approval.
    Signed { embed: Option<StoredEmbed> },
    Rejected,
}

/// A single task resolution, committed atomically.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub task_id: TaskId,
    pub outcome: Outcome,
    /// New composite pointer, already uploaded.
    pub composite: Option<BlobLocator>,
    /// Commit time (Unix ms).
    pub at: i64,
}

/// State after a committed resolution.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub document: Document,
    pub task: SigningTask,
}

/// The Store trait: async interface for documents and signing tasks.
///
/// # Design Notes
///
/// - **Atomic creation**: a document and its tasks are written together.
/// - **Conditional resolution**: [`Store::commit_resolution`] re-reads the
///   sibling tasks, re-checks the sequential gate, and updates the task only
///   if it is still `Pending`, all in one transaction. Two concurrent
///   resolutions of the same task cannot both succeed.
/// - **Derived status**: the document status is recomputed from the task
///   set and written in the same transaction as the task.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a document together with its tasks.
    ///
    /// Tasks must belong to the document, name distinct signers, and have
    /// orders exactly `1..=N`.
    async fn insert_document(&self, document: &Document, tasks: &[SigningTask]) -> Result<()>;

    /// Get a document by id.
    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>>;

    /// List documents created by a user, newest first.
    async fn documents_created_by(&self, creator: &UserId) -> Result<Vec<Document>>;

    /// Whether any document names `locator` as its original or composite.
    ///
    /// Blob locators may be content addresses, so one blob can back several
    /// documents.
    async fn blob_referenced(&self, locator: &BlobLocator) -> Result<bool>;

    /// Attach tasks to a document that has none.
    ///
    /// Fails with `Conflict` if the document already has tasks.
    async fn attach_tasks(
        &self,
        document_id: &DocumentId,
        tasks: &[SigningTask],
        at: i64,
    ) -> Result<Document>;

    /// Swap the composite pointer if it still equals `expected`.
    ///
    /// Fails with `Conflict` when another write moved the pointer first.
    async fn replace_composite(
        &self,
        document_id: &DocumentId,
        expected: Option<&BlobLocator>,
        composite: &BlobLocator,
        at: i64,
    ) -> Result<Document>;

    // ─────────────────────────────────────────────────────────────────────────
    // Tasks
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a task by id.
    async fn get_task(&self, id: &TaskId) -> Result<Option<SigningTask>>;

    /// All tasks on a document, ordered by `order`.
    async fn tasks_for_document(&self, document_id: &DocumentId) -> Result<Vec<SigningTask>>;

    /// All tasks naming a signer, across documents.
    async fn tasks_for_signer(&self, signer: &UserId) -> Result<Vec<SigningTask>>;

    /// Resolve a task in one read-modify-write transaction.
    async fn commit_resolution(&self, resolution: &Resolution) -> Result<Resolved>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Load a document and its ordered task set.
    fn document_with_tasks(
        &self,
        id: &DocumentId,
    ) -> impl std::future::Future<Output = Result<Option<(Document, Vec<SigningTask>)>>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn document_with_tasks(
        &self,
        id: &DocumentId,
    ) -> Result<Option<(Document, Vec<SigningTask>)>> {
        let Some(document) = self.get_document(id).await? else {
            return Ok(None);
        };
        let tasks = self.tasks_for_document(id).await?;
        Ok(Some((document, tasks)))
    }
}

/// Check a freshly built task set before it is written.
pub(crate) fn validate_task_set(document_id: &DocumentId, tasks: &[SigningTask]) -> Result<()> {
    if let Some(stray) = tasks.iter().find(|t| &t.document_id != document_id) {
        return Err(StoreError::InvalidData(format!(
            "task {} belongs to document {}",
            stray.id, stray.document_id
        )));
    }
    let mut signers = HashSet::new();
    if let Some(dup) = tasks.iter().find(|t| !signers.insert(&t.signer_id)) {
        return Err(StoreError::Conflict(format!(
            "signer {} appears twice on document {}",
            dup.signer_id, document_id
        )));
    }
    if !orders_are_contiguous(tasks) {
        return Err(StoreError::Conflict(format!(
            "task orders on document {} are not contiguous",
            document_id
        )));
    }
    if tasks.iter().any(|t| !t.is_pending()) {
        return Err(StoreError::InvalidData("new tasks must be pending".into()));
    }
    Ok(())
}

/// Apply a resolution to the task set in place, enforcing the gate.
///
/// Returns the index of the resolved task. Backends call this inside their
/// transaction on freshly read rows, then persist the result.
pub(crate) fn resolve_in_place(
    tasks: &mut [SigningTask],
    resolution: &Resolution,
) -> Result<usize> {
    let index = tasks
        .iter()
        .position(|t| t.id == resolution.task_id)
        .ok_or_else(|| StoreError::NotFound(format!("task {}", resolution.task_id)))?;

    check_transition(&tasks[index], tasks)?;

    let task = &mut tasks[index];
    match &resolution.outcome {
        Outcome::Signed { embed } => apply_signed(task, embed.clone(), resolution.at)?,
        Outcome::Rejected => apply_rejected(task, resolution.at)?,
    }
    Ok(index)
}

/// Write the derived status (and composite pointer) onto the document.
pub(crate) fn refresh_document(
    document: &mut Document,
    tasks: &[SigningTask],
    composite: Option<&BlobLocator>,
    at: i64,
) {
    document.status = derive_document_status(tasks);
    if let Some(locator) = composite {
        document.composite_blob = Some(locator.clone());
    }
    document.updated_at = at;
}

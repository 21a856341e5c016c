//! The Workflow: the one entry point that touches the ledger.
//!
//! The Workflow brings together the store, the blob store, the compositing
//! engine and the signer directory. It enforces authorization and the
//! sequential gate, and orders side effects so that a failed signing never
//! leaves a half-written document behind.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use signflow_composite::{Composite, Compositor, ReplayWarning};
use signflow_core::{
    can_transition, check_transition, now_millis, replay_log, sort_signers, BlobLocator,
    Document, DocumentId, DocumentStatus, Placement, RankTable, SignerRequest, SigningTask,
    StoredEmbed, TaskId, UserId,
};
use signflow_store::{BlobStore, Outcome, Resolution, Store, StoreExt};

use crate::config::WorkflowConfig;
use crate::directory::SignerDirectory;
use crate::error::{Result, WorkflowError};

/// Everything needed to register an uploaded document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub description: Option<String>,
    /// Where the uploaded file already lives.
    pub original_blob: BlobLocator,
    pub file_name: String,
    pub file_size: u64,
    /// Empty for a draft.
    pub signers: Vec<SignerRequest>,
}

impl NewDocument {
    pub fn new(
        title: impl Into<String>,
        file_name: impl Into<String>,
        original_blob: BlobLocator,
        file_size: u64,
    ) -> Self {
        Self {
            title: title.into(),
            description: None,
            original_blob,
            file_name: file_name.into(),
            file_size,
            signers: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn signer(mut self, signer: impl Into<String>, requested_order: u32) -> Self {
        self.signers.push(SignerRequest::new(signer, requested_order));
        self
    }
}

/// A visual signature as submitted by a signer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureEmbed {
    pub position: Placement,
    /// Base64 image, optionally as a `data:image/...;base64,` URL.
    pub image: String,
}

impl SignatureEmbed {
    pub fn new(position: Placement, image: impl Into<String>) -> Self {
        Self {
            position,
            image: image.into(),
        }
    }
}

/// What the signer decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Sign, optionally stamping a visual signature onto the document.
    Sign(Option<SignatureEmbed>),
    Reject,
}

/// Result of a successful signing or rejection.
#[derive(Debug, Clone)]
pub struct Signed {
    pub document: Document,
    pub task: SigningTask,
    /// Earlier signatures that could not be redrawn.
    pub warnings: Vec<ReplayWarning>,
}

/// Result of regenerating a composite.
#[derive(Debug, Clone)]
pub struct Rebuilt {
    pub document: Document,
    pub warnings: Vec<ReplayWarning>,
}

/// Bytes to serve for a download.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub locator: BlobLocator,
    pub bytes: Bytes,
}

/// A task that is waiting on its signer right now.
#[derive(Debug, Clone)]
pub struct InboxEntry {
    pub document: Document,
    pub task: SigningTask,
}

/// The signing workflow.
pub struct Workflow<S: Store, B: BlobStore, D: SignerDirectory> {
    store: Arc<S>,
    blobs: Arc<B>,
    directory: Arc<D>,
    compositor: Compositor,
    ranks: RankTable,
    config: WorkflowConfig,
}

impl<S: Store, B: BlobStore, D: SignerDirectory> Workflow<S, B, D> {
    /// Create a new workflow.
    pub fn new(store: S, blobs: B, directory: D, config: WorkflowConfig) -> Self {
        Self::from_shared(Arc::new(store), Arc::new(blobs), Arc::new(directory), config)
    }

    /// Create a workflow over backends that are shared with other owners.
    pub fn from_shared(
        store: Arc<S>,
        blobs: Arc<B>,
        directory: Arc<D>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            directory,
            compositor: Compositor::new(config.composite_config()),
            ranks: config.rank_table(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Creation
    // ─────────────────────────────────────────────────────────────────────────

    /// Upload a file to become a document's original.
    pub async fn upload_original(&self, bytes: Bytes) -> Result<BlobLocator> {
        if !bytes.starts_with(b"%PDF-") {
            return Err(WorkflowError::InvalidRequest(
                "only PDF files can be signed".into(),
            ));
        }
        self.put_with_retry(bytes).await
    }

    /// Register a document and fix its signing chain.
    ///
    /// With no signers the document is a `DRAFT`; otherwise signers are
    /// ranked by title and the document starts `PENDING`.
    pub async fn create_document(
        &self,
        creator: &UserId,
        request: NewDocument,
    ) -> Result<(Document, Vec<SigningTask>)> {
        if request.title.trim().is_empty() {
            return Err(WorkflowError::InvalidRequest("title is required".into()));
        }
        if request.file_name.trim().is_empty() {
            return Err(WorkflowError::InvalidRequest("file name is required".into()));
        }

        let now = now_millis();
        let id = DocumentId::generate();
        let tasks = self.plan_chain(id, &request.signers, now).await?;

        let document = Document {
            id,
            title: request.title,
            description: request.description,
            original_blob: request.original_blob,
            composite_blob: None,
            file_name: request.file_name,
            file_size: request.file_size,
            status: if tasks.is_empty() {
                DocumentStatus::Draft
            } else {
                DocumentStatus::Pending
            },
            created_by: creator.clone(),
            created_at: now,
            updated_at: now,
        };

        self.store.insert_document(&document, &tasks).await?;

        tracing::info!(
            document = %document.id,
            creator = %creator,
            signers = tasks.len(),
            status = %document.status,
            "created document"
        );
        Ok((document, tasks))
    }

    /// Give a draft its signing chain.
    pub async fn attach_signers(
        &self,
        requester: &UserId,
        document_id: &DocumentId,
        signers: Vec<SignerRequest>,
    ) -> Result<(Document, Vec<SigningTask>)> {
        let document = self.load_document(document_id).await?;
        if &document.created_by != requester {
            return Err(WorkflowError::Forbidden(
                "only the creator can assign signers".into(),
            ));
        }
        if document.status != DocumentStatus::Draft {
            return Err(WorkflowError::InvalidRequest(format!(
                "signers can only be added to a draft, document is {}",
                document.status
            )));
        }
        if signers.is_empty() {
            return Err(WorkflowError::InvalidRequest("no signers given".into()));
        }

        let now = now_millis();
        let tasks = self.plan_chain(*document_id, &signers, now).await?;
        let document = self.store.attach_tasks(document_id, &tasks, now).await?;

        tracing::info!(document = %document.id, signers = tasks.len(), "attached signers");
        Ok((document, tasks))
    }

    /// Rank the requested signers and build one pending task each.
    async fn plan_chain(
        &self,
        document_id: DocumentId,
        signers: &[SignerRequest],
        now: i64,
    ) -> Result<Vec<SigningTask>> {
        let mut seen = HashSet::new();
        if let Some(dup) = signers.iter().find(|s| !seen.insert(&s.signer_id)) {
            return Err(WorkflowError::InvalidRequest(format!(
                "signer {} listed more than once",
                dup.signer_id
            )));
        }

        let mut ranks = HashMap::with_capacity(signers.len());
        for signer in signers {
            let title = self
                .directory
                .title_of(&signer.signer_id)
                .await
                .map_err(|e| match e {
                    WorkflowError::Directory(_) => e,
                    other => WorkflowError::Directory(format!(
                        "title lookup for {} failed: {}",
                        signer.signer_id, other
                    )),
                })?;
            ranks.insert(&signer.signer_id, self.ranks.rank_of(title.as_deref()));
        }

        let unranked = self.ranks.unranked();
        Ok(sort_signers(signers, |id| ranks.get(id).copied().unwrap_or(unranked))
            .into_iter()
            .map(|slot| SigningTask::new(document_id, slot.signer_id, slot.order, now))
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Signing
    // ─────────────────────────────────────────────────────────────────────────

    /// Sign or reject a task.
    ///
    /// For a visual signature the new composite is rendered and uploaded
    /// before anything is committed; if either step fails, nothing changes.
    pub async fn resolve_signature(
        &self,
        requester: &UserId,
        task_id: &TaskId,
        decision: Decision,
    ) -> Result<Signed> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("task {}", task_id)))?;
        if &task.signer_id != requester {
            return Err(WorkflowError::Forbidden(format!(
                "task {} belongs to another signer",
                task_id
            )));
        }

        let (document, tasks) = self
            .store
            .document_with_tasks(&task.document_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("document {}", task.document_id)))?;
        check_transition(&task, &tasks)?;

        let now = now_millis();
        let (outcome, rendered) = match decision {
            Decision::Reject => (Outcome::Rejected, None),
            Decision::Sign(None) => (Outcome::Signed { embed: None }, None),
            Decision::Sign(Some(embed)) => {
                let embed = StoredEmbed {
                    position: embed.position,
                    image: embed.image,
                    applied_at: now,
                };
                let history: Vec<StoredEmbed> = replay_log(&tasks, Some(&task))
                    .into_iter()
                    .cloned()
                    .collect();
                let original = self.blobs.get(&document.original_blob).await?;
                let composite = self.render(original, history, Some(embed.clone())).await?;
                let locator = self.put_with_retry(composite.bytes).await?;
                (
                    Outcome::Signed { embed: Some(embed) },
                    Some((locator, composite.warnings)),
                )
            }
        };

        let resolution = Resolution {
            task_id: *task_id,
            outcome,
            composite: rendered.as_ref().map(|(locator, _)| locator.clone()),
            at: now,
        };

        let resolved = match self.store.commit_resolution(&resolution).await {
            Ok(resolved) => resolved,
            Err(e) => {
                if let Some((locator, _)) = &rendered {
                    self.discard_orphan(&document.id, locator).await;
                }
                return Err(e.into());
            }
        };

        tracing::info!(
            task = %resolved.task.id,
            document = %resolved.document.id,
            signer = %requester,
            order = resolved.task.order,
            task_status = %resolved.task.status,
            document_status = %resolved.document.status,
            visual = rendered.is_some(),
            "resolved signing task"
        );

        Ok(Signed {
            document: resolved.document,
            task: resolved.task,
            warnings: rendered.map(|(_, warnings)| warnings).unwrap_or_default(),
        })
    }

    /// Regenerate the composite from the original and the signing log.
    pub async fn rebuild_composite(
        &self,
        requester: &UserId,
        document_id: &DocumentId,
    ) -> Result<Rebuilt> {
        let (document, tasks) = self
            .store
            .document_with_tasks(document_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("document {}", document_id)))?;
        if &document.created_by != requester {
            return Err(WorkflowError::Forbidden(
                "only the creator can rebuild a document".into(),
            ));
        }

        let history: Vec<StoredEmbed> = replay_log(&tasks, None).into_iter().cloned().collect();
        if history.is_empty() {
            return Ok(Rebuilt {
                document,
                warnings: Vec::new(),
            });
        }

        let original = self.blobs.get(&document.original_blob).await?;
        let composite = self.render(original, history, None).await?;
        let locator = self.put_with_retry(composite.bytes).await?;

        let updated = match self
            .store
            .replace_composite(
                document_id,
                document.composite_blob.as_ref(),
                &locator,
                now_millis(),
            )
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                self.discard_orphan(document_id, &locator).await;
                return Err(e.into());
            }
        };

        tracing::info!(
            document = %document_id,
            replayed = tasks.iter().filter(|t| t.embed.is_some()).count(),
            warnings = composite.warnings.len(),
            "rebuilt composite"
        );
        Ok(Rebuilt {
            document: updated,
            warnings: composite.warnings,
        })
    }

    /// Run the compositor off the async runtime.
    async fn render(
        &self,
        original: Bytes,
        history: Vec<StoredEmbed>,
        new: Option<StoredEmbed>,
    ) -> Result<Composite> {
        let compositor = self.compositor.clone();
        let composite = tokio::task::spawn_blocking(move || {
            let applied: Vec<&StoredEmbed> = history.iter().collect();
            match &new {
                Some(new) => compositor.composite(&original, &applied, new),
                None => compositor.rebuild(&original, &applied),
            }
        })
        .await
        .map_err(|e| WorkflowError::Internal(format!("compositing task failed: {}", e)))??;
        Ok(composite)
    }

    /// Upload, retrying transient failures with exponential backoff.
    async fn put_with_retry(&self, bytes: Bytes) -> Result<BlobLocator> {
        let attempts = self.config.upload_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.blobs.put(bytes.clone()).await {
                Ok(locator) => return Ok(locator),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.config.upload_backoff(attempt - 1);
                    tracing::warn!(
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "blob upload failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Best-effort removal of a composite whose commit did not land.
    async fn discard_orphan(&self, document_id: &DocumentId, locator: &BlobLocator) {
        // Locators are content addresses: the winning writer, or another
        // document built from the same form and signature, may hold the
        // same locator.
        match self.store.blob_referenced(locator).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(%locator, error = %e, "cannot check orphaned composite, keeping it");
                return;
            }
        }
        match self.blobs.delete(locator).await {
            Ok(()) => tracing::warn!(%locator, document = %document_id, "deleted orphaned composite"),
            Err(e) => tracing::warn!(
                %locator,
                document = %document_id,
                error = %e,
                "failed to delete orphaned composite"
            ),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reading
    // ─────────────────────────────────────────────────────────────────────────

    /// The latest rendering: composite if one exists, else the original.
    pub async fn download_document(
        &self,
        requester: &UserId,
        document_id: &DocumentId,
    ) -> Result<Download> {
        let (document, _) = self.readable(requester, document_id).await?;
        let locator = document.current_blob().clone();
        let bytes = self.blobs.get(&locator).await?;
        Ok(Download {
            file_name: document.file_name,
            locator,
            bytes,
        })
    }

    /// A time-limited URL for the latest rendering.
    pub async fn preview_url(
        &self,
        requester: &UserId,
        document_id: &DocumentId,
        ttl: Option<Duration>,
    ) -> Result<String> {
        let (document, _) = self.readable(requester, document_id).await?;
        let ttl = ttl.unwrap_or_else(|| self.config.preview_ttl());
        Ok(self.blobs.signed_url(document.current_blob(), ttl).await?)
    }

    pub async fn document(&self, requester: &UserId, document_id: &DocumentId) -> Result<Document> {
        Ok(self.readable(requester, document_id).await?.0)
    }

    /// The signing chain, in order.
    pub async fn tasks(
        &self,
        requester: &UserId,
        document_id: &DocumentId,
    ) -> Result<Vec<SigningTask>> {
        Ok(self.readable(requester, document_id).await?.1)
    }

    /// Tasks the requester can act on right now.
    pub async fn inbox(&self, requester: &UserId) -> Result<Vec<InboxEntry>> {
        let mut entries = Vec::new();
        for task in self.store.tasks_for_signer(requester).await? {
            if !task.is_pending() {
                continue;
            }
            let Some((document, siblings)) =
                self.store.document_with_tasks(&task.document_id).await?
            else {
                continue;
            };
            if can_transition(&task, &siblings) {
                entries.push(InboxEntry { document, task });
            }
        }
        Ok(entries)
    }

    /// Documents the requester created, newest first.
    pub async fn created_by(&self, requester: &UserId) -> Result<Vec<Document>> {
        Ok(self.store.documents_created_by(requester).await?)
    }

    async fn load_document(&self, document_id: &DocumentId) -> Result<Document> {
        self.store
            .get_document(document_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("document {}", document_id)))
    }

    /// Load a document the requester created or is named on.
    async fn readable(
        &self,
        requester: &UserId,
        document_id: &DocumentId,
    ) -> Result<(Document, Vec<SigningTask>)> {
        let (document, tasks) = self
            .store
            .document_with_tasks(document_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("document {}", document_id)))?;

        let allowed =
            &document.created_by == requester || tasks.iter().any(|t| &t.signer_id == requester);
        if !allowed {
            return Err(WorkflowError::Forbidden(format!(
                "{} is not a party to document {}",
                requester, document_id
            )));
        }
        Ok((document, tasks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use signflow_store::{BlobError, MemoryBlobStore, MemoryStore};

    fn pdf_stub() -> Bytes {
        Bytes::from_static(b"%PDF-1.5\n%stub\n")
    }

    async fn workflow() -> Workflow<MemoryStore, MemoryBlobStore, StaticDirectory> {
        let directory = StaticDirectory::new()
            .with_title("vp", "VICE_PRESIDENT")
            .with_title("mgr", "MANAGER")
            .with_title("staff", "STAFF");
        Workflow::new(
            MemoryStore::new(),
            MemoryBlobStore::new(),
            directory,
            WorkflowConfig::default(),
        )
    }

    async fn create(
        wf: &Workflow<MemoryStore, MemoryBlobStore, StaticDirectory>,
        signers: &[&str],
    ) -> (Document, Vec<SigningTask>) {
        let original = wf.upload_original(pdf_stub()).await.unwrap();
        let mut request = NewDocument::new("Budget", "budget.pdf", original, 15);
        for (i, s) in signers.iter().enumerate() {
            request = request.signer(*s, i as u32 + 1);
        }
        wf.create_document(&UserId::new("owner"), request).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_ranks_by_title() {
        let wf = workflow().await;
        let (doc, tasks) = create(&wf, &["staff", "nobody", "vp", "mgr"]).await;

        assert_eq!(doc.status, DocumentStatus::Pending);
        let chain: Vec<(&str, u32)> = tasks
            .iter()
            .map(|t| (t.signer_id.as_str(), t.order))
            .collect();
        assert_eq!(chain, vec![("vp", 1), ("mgr", 2), ("staff", 3), ("nobody", 4)]);
    }

    struct UnreachableDirectory;

    #[async_trait::async_trait]
    impl SignerDirectory for UnreachableDirectory {
        async fn title_of(&self, _user: &UserId) -> Result<Option<String>> {
            Err(WorkflowError::Internal("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_directory_failure_creates_nothing() {
        let wf = Workflow::new(
            MemoryStore::new(),
            MemoryBlobStore::new(),
            UnreachableDirectory,
            WorkflowConfig::default(),
        );
        let original = wf.upload_original(pdf_stub()).await.unwrap();
        let request = NewDocument::new("Budget", "budget.pdf", original, 15).signer("mgr", 1);

        match wf.create_document(&UserId::new("owner"), request).await {
            Err(WorkflowError::Directory(msg)) => {
                assert!(msg.contains("mgr"));
                assert!(msg.contains("connection refused"));
            }
            other => panic!("expected a directory error, got {:?}", other),
        }
        assert!(wf.created_by(&UserId::new("owner")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_without_signers_is_draft() {
        let wf = workflow().await;
        let (doc, tasks) = create(&wf, &[]).await;
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_create_validation() {
        let wf = workflow().await;
        let owner = UserId::new("owner");
        let locator = BlobLocator::new("x");

        let blank = NewDocument::new("  ", "a.pdf", locator.clone(), 1);
        assert!(matches!(
            wf.create_document(&owner, blank).await,
            Err(WorkflowError::InvalidRequest(_))
        ));

        let dup = NewDocument::new("t", "a.pdf", locator, 1)
            .signer("mgr", 1)
            .signer("mgr", 2);
        assert!(matches!(
            wf.create_document(&owner, dup).await,
            Err(WorkflowError::InvalidRequest(_))
        ));

        assert!(matches!(
            wf.upload_original(Bytes::from_static(b"GIF89a")).await,
            Err(WorkflowError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_only_named_signer_may_resolve() {
        let wf = workflow().await;
        let (_, tasks) = create(&wf, &["mgr"]).await;

        let err = wf
            .resolve_signature(&UserId::new("staff"), &tasks[0].id, Decision::Sign(None))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));

        let err = wf
            .resolve_signature(&UserId::new("mgr"), &TaskId::generate(), Decision::Reject)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_approval_signing_needs_no_compositing() {
        let wf = workflow().await;
        let (doc, tasks) = create(&wf, &["vp", "mgr"]).await;

        let first = wf
            .resolve_signature(&UserId::new("vp"), &tasks[0].id, Decision::Sign(None))
            .await
            .unwrap();
        assert_eq!(first.document.status, DocumentStatus::Signed);
        assert_eq!(first.document.composite_blob, None);

        let second = wf
            .resolve_signature(&UserId::new("mgr"), &tasks[1].id, Decision::Sign(None))
            .await
            .unwrap();
        assert_eq!(second.document.status, DocumentStatus::Completed);

        let again = wf
            .resolve_signature(&UserId::new("mgr"), &tasks[1].id, Decision::Sign(None))
            .await
            .unwrap_err();
        assert!(matches!(again, WorkflowError::AlreadyResolved(id) if id == tasks[1].id));

        let download = wf.download_document(&UserId::new("mgr"), &doc.id).await.unwrap();
        assert_eq!(download.bytes, pdf_stub());
    }

    #[tokio::test]
    async fn test_undecodable_original_leaves_task_pending() {
        let wf = workflow().await;
        let (doc, tasks) = create(&wf, &["mgr"]).await;
        let embed = SignatureEmbed::new(
            Placement {
                page: 1,
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
            },
            "iVBORw0KGgo=",
        );

        let err = wf
            .resolve_signature(&UserId::new("mgr"), &tasks[0].id, Decision::Sign(Some(embed)))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Compositing(_)));

        let task = wf.store().get_task(&tasks[0].id).await.unwrap().unwrap();
        assert!(task.is_pending());
        let doc = wf.document(&UserId::new("owner"), &doc.id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(wf.blobs().len().await, 1);
    }

    #[tokio::test]
    async fn test_outsiders_cannot_read() {
        let wf = workflow().await;
        let (doc, _) = create(&wf, &["mgr"]).await;
        let outsider = UserId::new("staff");

        assert!(matches!(
            wf.download_document(&outsider, &doc.id).await,
            Err(WorkflowError::Forbidden(_))
        ));
        assert!(matches!(
            wf.preview_url(&outsider, &doc.id, None).await,
            Err(WorkflowError::Forbidden(_))
        ));
        assert!(wf.tasks(&UserId::new("mgr"), &doc.id).await.is_ok());
        assert!(wf
            .preview_url(&UserId::new("owner"), &doc.id, Some(Duration::from_secs(5)))
            .await
            .unwrap()
            .starts_with("memory://"));
    }

    #[tokio::test]
    async fn test_attach_signers_to_draft_only() {
        let wf = workflow().await;
        let (doc, _) = create(&wf, &[]).await;

        let err = wf
            .attach_signers(&UserId::new("mgr"), &doc.id, vec![SignerRequest::new("mgr", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));

        let (doc, tasks) = wf
            .attach_signers(
                &UserId::new("owner"),
                &doc.id,
                vec![SignerRequest::new("staff", 1), SignerRequest::new("vp", 2)],
            )
            .await
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(tasks[0].signer_id, UserId::new("vp"));

        let err = wf
            .attach_signers(&UserId::new("owner"), &doc.id, vec![SignerRequest::new("mgr", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_inbox_shows_only_current_turn() {
        let wf = workflow().await;
        let (_, tasks) = create(&wf, &["vp", "mgr"]).await;

        assert!(wf.inbox(&UserId::new("mgr")).await.unwrap().is_empty());
        assert_eq!(wf.inbox(&UserId::new("vp")).await.unwrap().len(), 1);

        wf.resolve_signature(&UserId::new("vp"), &tasks[0].id, Decision::Sign(None))
            .await
            .unwrap();
        let inbox = wf.inbox(&UserId::new("mgr")).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].task.id, tasks[1].id);
        assert!(wf.inbox(&UserId::new("vp")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_created_by_lists_own_documents() {
        let wf = workflow().await;
        create(&wf, &["mgr"]).await;
        create(&wf, &[]).await;
        assert_eq!(wf.created_by(&UserId::new("owner")).await.unwrap().len(), 2);
        assert!(wf.created_by(&UserId::new("mgr")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_without_embeds_is_noop() {
        let wf = workflow().await;
        let (doc, _) = create(&wf, &["mgr"]).await;
        let rebuilt = wf.rebuild_composite(&UserId::new("owner"), &doc.id).await.unwrap();
        assert_eq!(rebuilt.document.composite_blob, None);
        assert!(matches!(
            wf.rebuild_composite(&UserId::new("mgr"), &doc.id).await,
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[test]
    fn test_blob_errors_convert() {
        let e: WorkflowError = BlobError::Transient("x".into()).into();
        assert!(matches!(e, WorkflowError::Blob(_)));
    }
}

//! Test fixtures and helpers.
//!
//! Sample documents, signature images, and a ready-made workflow harness
//! for integration tests.

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};

use signflow::{
    Decision, Document, NewDocument, Placement, SignatureEmbed, Signed, SigningTask,
    StaticDirectory, UserId, Workflow, WorkflowConfig, WorkflowError,
};
use signflow_core::{BlobLocator, DocumentId, TaskId};
use signflow_store::{
    BlobError, BlobResult, BlobStore, MemoryBlobStore, MemoryStore, Resolution, Resolved,
    SqliteStore, Store,
};
use tokio::sync::Barrier;

/// US Letter, in PDF points.
pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;

/// Titles used by [`org_directory`], highest rank first.
pub const ORG: &[(&str, &str)] = &[
    ("vera", "VICE_PRESIDENT"),
    ("sam", "SENIOR_MANAGER"),
    ("maya", "MANAGER"),
    ("ana", "ASISTEN_MANAGER"),
    ("sid", "SUPERVISOR"),
    ("stan", "STAFF"),
];

/// A minimal valid PDF with `pages` Letter-sized pages.
///
/// Each page carries a grey box so composites have something to sit on.
pub fn sample_pdf(pages: usize) -> Bytes {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            let content = Content {
                operations: vec![
                    Operation::new("g", vec![Object::Real(0.85)]),
                    Operation::new(
                        "re",
                        vec![36.into(), 36.into(), 540.into(), 720.into()],
                    ),
                    Operation::new("S", vec![]),
                ],
            };
            let encoded = content.encode().unwrap_or_default();
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            page_id.into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap_or_default();
    Bytes::from(out)
}

/// A solid-colour PNG signature as a data URL.
pub fn png_signature(width: u32, height: u32, alpha: u8) -> String {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([20, 30, 140, alpha]));
    let mut buf = Cursor::new(Vec::new());
    let _ = img.write_to(&mut buf, image::ImageFormat::Png);
    format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(buf.into_inner())
    )
}

/// A JPEG signature as a data URL.
pub fn jpeg_signature() -> String {
    let img = image::RgbImage::from_pixel(16, 8, image::Rgb([10, 10, 10]));
    let mut buf = Cursor::new(Vec::new());
    let _ = img.write_to(&mut buf, image::ImageFormat::Jpeg);
    format!(
        "data:image/jpeg;base64,{}",
        general_purpose::STANDARD.encode(buf.into_inner())
    )
}

pub fn placement(page: u32, x: f32, y: f32) -> Placement {
    Placement {
        page,
        x,
        y,
        width: 120.0,
        height: 40.0,
    }
}

/// A visual signature at the given spot.
pub fn embed_at(page: u32, x: f32, y: f32) -> SignatureEmbed {
    SignatureEmbed::new(placement(page, x, y), png_signature(24, 8, 255))
}

/// A directory with one user per built-in rank.
pub fn org_directory() -> StaticDirectory {
    ORG.iter()
        .fold(StaticDirectory::new(), |dir, (user, title)| dir.with_title(*user, *title))
}

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// ─────────────────────────────────────────────────────────────────────────────
// Flaky blob store
// ─────────────────────────────────────────────────────────────────────────────

/// Wraps a blob store and fails uploads on demand.
pub struct FlakyBlobStore<B> {
    inner: B,
    failures_left: AtomicU32,
    transient: AtomicBool,
    put_calls: AtomicU32,
}

impl<B: BlobStore> FlakyBlobStore<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(0),
            transient: AtomicBool::new(true),
            put_calls: AtomicU32::new(0),
        }
    }

    /// Make the next `count` uploads fail.
    pub fn fail_next_puts(&self, count: u32, transient: bool) {
        self.transient.store(transient, Ordering::SeqCst);
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Upload attempts seen so far, failed ones included.
    pub fn put_calls(&self) -> u32 {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: BlobStore> BlobStore for FlakyBlobStore<B> {
    async fn put(&self, bytes: Bytes) -> BlobResult<BlobLocator> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(if self.transient.load(Ordering::SeqCst) {
                BlobError::Transient("injected upload failure".into())
            } else {
                BlobError::Backend("injected upload failure".into())
            });
        }
        self.inner.put(bytes).await
    }

    async fn get(&self, locator: &BlobLocator) -> BlobResult<Bytes> {
        self.inner.get(locator).await
    }

    async fn signed_url(&self, locator: &BlobLocator, ttl: Duration) -> BlobResult<String> {
        self.inner.signed_url(locator, ttl).await
    }

    async fn delete(&self, locator: &BlobLocator) -> BlobResult<()> {
        self.inner.delete(locator).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gated store
// ─────────────────────────────────────────────────────────────────────────────

/// Wraps a store and, once armed, holds commits until a given number of
/// them have arrived, so racing resolutions all upload before any commits.
pub struct GatedStore<S> {
    inner: S,
    gate: Mutex<Option<Gate>>,
}

struct Gate {
    barrier: Arc<Barrier>,
    remaining: u32,
}

impl<S: Store> GatedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            gate: Mutex::new(None),
        }
    }

    /// Hold the next `count` commits until all of them are waiting.
    pub fn hold_next_commits(&self, count: u32) {
        if let Ok(mut gate) = self.gate.lock() {
            *gate = (count > 0).then(|| Gate {
                barrier: Arc::new(Barrier::new(count as usize)),
                remaining: count,
            });
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn take_slot(&self) -> Option<Arc<Barrier>> {
        let mut gate = self.gate.lock().ok()?;
        let slot = gate.as_mut()?;
        let barrier = Arc::clone(&slot.barrier);
        slot.remaining -= 1;
        if slot.remaining == 0 {
            *gate = None;
        }
        Some(barrier)
    }
}

#[async_trait]
impl<S: Store> Store for GatedStore<S> {
    async fn insert_document(
        &self,
        document: &Document,
        tasks: &[SigningTask],
    ) -> signflow_store::Result<()> {
        self.inner.insert_document(document, tasks).await
    }

    async fn get_document(&self, id: &DocumentId) -> signflow_store::Result<Option<Document>> {
        self.inner.get_document(id).await
    }

    async fn documents_created_by(
        &self,
        creator: &UserId,
    ) -> signflow_store::Result<Vec<Document>> {
        self.inner.documents_created_by(creator).await
    }

    async fn blob_referenced(&self, locator: &BlobLocator) -> signflow_store::Result<bool> {
        self.inner.blob_referenced(locator).await
    }

    async fn attach_tasks(
        &self,
        document_id: &DocumentId,
        tasks: &[SigningTask],
        at: i64,
    ) -> signflow_store::Result<Document> {
        self.inner.attach_tasks(document_id, tasks, at).await
    }

    async fn replace_composite(
        &self,
        document_id: &DocumentId,
        expected: Option<&BlobLocator>,
        composite: &BlobLocator,
        at: i64,
    ) -> signflow_store::Result<Document> {
        self.inner
            .replace_composite(document_id, expected, composite, at)
            .await
    }

    async fn get_task(&self, id: &TaskId) -> signflow_store::Result<Option<SigningTask>> {
        self.inner.get_task(id).await
    }

    async fn tasks_for_document(
        &self,
        document_id: &DocumentId,
    ) -> signflow_store::Result<Vec<SigningTask>> {
        self.inner.tasks_for_document(document_id).await
    }

    async fn tasks_for_signer(&self, signer: &UserId) -> signflow_store::Result<Vec<SigningTask>> {
        self.inner.tasks_for_signer(signer).await
    }

    async fn commit_resolution(&self, resolution: &Resolution) -> signflow_store::Result<Resolved> {
        if let Some(barrier) = self.take_slot() {
            barrier.wait().await;
        }
        self.inner.commit_resolution(resolution).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

pub type TestBlobs = FlakyBlobStore<MemoryBlobStore>;
pub type TestWorkflow<S> = Workflow<S, TestBlobs, StaticDirectory>;

/// A workflow over in-process backends, with the [`ORG`] directory.
pub struct Harness<S: Store> {
    pub workflow: Arc<TestWorkflow<S>>,
    pub owner: UserId,
}

impl Harness<MemoryStore> {
    pub fn memory() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl Harness<SqliteStore> {
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        match SqliteStore::open(path) {
            Ok(store) => Self::with_store(store),
            Err(e) => panic!("cannot open test database: {e}"),
        }
    }
}

impl<S: Store> Harness<S> {
    pub fn with_store(store: S) -> Self {
        let config = WorkflowConfig {
            upload_backoff_ms: 1,
            ..Default::default()
        };
        Self {
            workflow: Arc::new(Workflow::new(
                store,
                FlakyBlobStore::new(MemoryBlobStore::new()),
                org_directory(),
                config,
            )),
            owner: UserId::new("owner"),
        }
    }

    pub fn blobs(&self) -> &TestBlobs {
        self.workflow.blobs()
    }

    /// Upload a sample PDF and create a document for `signers`, requested
    /// in the order given.
    pub async fn create(
        &self,
        pages: usize,
        signers: &[&str],
    ) -> Result<(Document, Vec<SigningTask>), WorkflowError> {
        let pdf = sample_pdf(pages);
        let size = pdf.len() as u64;
        let original = self.workflow.upload_original(pdf).await?;
        let request = signers.iter().enumerate().fold(
            NewDocument::new("Quarterly report", "report.pdf", original, size),
            |req, (i, signer)| req.signer(*signer, i as u32 + 1),
        );
        self.workflow.create_document(&self.owner, request).await
    }

    /// Sign `task` as `signer`, with an optional visual signature.
    pub async fn sign(
        &self,
        signer: &str,
        task: &SigningTask,
        embed: Option<SignatureEmbed>,
    ) -> Result<Signed, WorkflowError> {
        self.workflow
            .resolve_signature(&UserId::new(signer), &task.id, Decision::Sign(embed))
            .await
    }

    pub async fn reject(&self, signer: &str, task: &SigningTask) -> Result<Signed, WorkflowError> {
        self.workflow
            .resolve_signature(&UserId::new(signer), &task.id, Decision::Reject)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signflow_composite::{drawn_images, Compositor};

    #[test]
    fn test_sample_pdf_parses() {
        let pdf = sample_pdf(3);
        let doc = lopdf::Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        assert!(drawn_images(&pdf).unwrap().is_empty());
    }

    #[test]
    fn test_signatures_composite() {
        let pdf = sample_pdf(1);
        let stored = signflow_core::StoredEmbed {
            position: placement(1, 10.0, 10.0),
            image: jpeg_signature(),
            applied_at: 0,
        };
        let out = Compositor::default().composite(&pdf, &[], &stored).unwrap();
        assert_eq!(drawn_images(&out.bytes).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_flaky_store_fails_then_recovers() {
        let blobs = FlakyBlobStore::new(MemoryBlobStore::new());
        blobs.fail_next_puts(2, true);

        assert!(blobs.put(Bytes::from_static(b"a")).await.unwrap_err().is_transient());
        assert!(blobs.put(Bytes::from_static(b"a")).await.is_err());
        assert!(blobs.put(Bytes::from_static(b"a")).await.is_ok());
        assert_eq!(blobs.put_calls(), 3);
    }

    #[tokio::test]
    async fn test_harness_creates_ranked_chain() {
        let harness = Harness::memory();
        let (_, tasks) = harness.create(1, &["stan", "vera"]).await.unwrap();
        assert_eq!(tasks[0].signer_id, UserId::new("vera"));
        assert_eq!(tasks[1].signer_id, UserId::new("stan"));
    }
}

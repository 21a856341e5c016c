//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use signflow_core::{BlobLocator, Document, DocumentId, SigningTask, TaskId, UserId};

use crate::error::{Result, StoreError};
use crate::traits::{
    refresh_document, resolve_in_place, validate_task_set, Resolution, Resolved, Store,
};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; every
/// mutation holds the write lock for its whole read-modify-write.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Documents indexed by id.
    documents: HashMap<DocumentId, Document>,

    /// Tasks indexed by id.
    tasks: HashMap<TaskId, SigningTask>,

    /// Document -> its task ids.
    by_document: HashMap<DocumentId, Vec<TaskId>>,
}

impl MemoryStoreInner {
    fn ordered_tasks(&self, document_id: &DocumentId) -> Vec<SigningTask> {
        let mut tasks: Vec<SigningTask> = self
            .by_document
            .get(document_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.tasks.get(id).cloned())
            .collect();
        tasks.sort_by_key(|t| t.order);
        tasks
    }

    fn put_tasks(&mut self, document_id: DocumentId, tasks: &[SigningTask]) {
        let ids = self.by_document.entry(document_id).or_default();
        for task in tasks {
            ids.push(task.id);
            self.tasks.insert(task.id, task.clone());
        }
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_document(&self, document: &Document, tasks: &[SigningTask]) -> Result<()> {
        validate_task_set(&document.id, tasks)?;
        let mut inner = self.write()?;

        if inner.documents.contains_key(&document.id) {
            return Err(StoreError::Conflict(format!("document {} exists", document.id)));
        }
        inner.documents.insert(document.id, document.clone());
        inner.put_tasks(document.id, tasks);
        Ok(())
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        Ok(self.read()?.documents.get(id).cloned())
    }

    async fn documents_created_by(&self, creator: &UserId) -> Result<Vec<Document>> {
        let inner = self.read()?;
        let mut documents: Vec<Document> = inner
            .documents
            .values()
            .filter(|d| &d.created_by == creator)
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    async fn blob_referenced(&self, locator: &BlobLocator) -> Result<bool> {
        Ok(self.read()?.documents.values().any(|d| {
            &d.original_blob == locator || d.composite_blob.as_ref() == Some(locator)
        }))
    }

    async fn attach_tasks(
        &self,
        document_id: &DocumentId,
        tasks: &[SigningTask],
        at: i64,
    ) -> Result<Document> {
        validate_task_set(document_id, tasks)?;
        let mut inner = self.write()?;

        if !inner.ordered_tasks(document_id).is_empty() {
            return Err(StoreError::Conflict(format!(
                "document {} already has signers",
                document_id
            )));
        }
        let mut document = inner
            .documents
            .get(document_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("document {}", document_id)))?;

        inner.put_tasks(*document_id, tasks);
        refresh_document(&mut document, tasks, None, at);
        inner.documents.insert(*document_id, document.clone());
        Ok(document)
    }

    async fn replace_composite(
        &self,
        document_id: &DocumentId,
        expected: Option<&BlobLocator>,
        composite: &BlobLocator,
        at: i64,
    ) -> Result<Document> {
        let mut inner = self.write()?;
        let document = inner
            .documents
            .get_mut(document_id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", document_id)))?;

        if document.composite_blob.as_ref() != expected {
            return Err(StoreError::Conflict(format!(
                "composite of document {} changed concurrently",
                document_id
            )));
        }
        document.composite_blob = Some(composite.clone());
        document.updated_at = at;
        Ok(document.clone())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<SigningTask>> {
        Ok(self.read()?.tasks.get(id).cloned())
    }

    async fn tasks_for_document(&self, document_id: &DocumentId) -> Result<Vec<SigningTask>> {
        Ok(self.read()?.ordered_tasks(document_id))
    }

    async fn tasks_for_signer(&self, signer: &UserId) -> Result<Vec<SigningTask>> {
        let inner = self.read()?;
        let mut tasks: Vec<SigningTask> = inner
            .tasks
            .values()
            .filter(|t| &t.signer_id == signer)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.created_at, t.order));
        Ok(tasks)
    }

    async fn commit_resolution(&self, resolution: &Resolution) -> Result<Resolved> {
        let mut inner = self.write()?;

        let document_id = inner
            .tasks
            .get(&resolution.task_id)
            .map(|t| t.document_id)
            .ok_or_else(|| StoreError::NotFound(format!("task {}", resolution.task_id)))?;
        let mut document = inner
            .documents
            .get(&document_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("document {}", document_id)))?;

        let mut tasks = inner.ordered_tasks(&document_id);
        let index = resolve_in_place(&mut tasks, resolution)?;
        refresh_document(&mut document, &tasks, resolution.composite.as_ref(), resolution.at);

        let task = tasks.swap_remove(index);
        inner.tasks.insert(task.id, task.clone());
        inner.documents.insert(document_id, document.clone());

        Ok(Resolved { document, task })
    }
}

//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for SignFlow. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use signflow_core::{
    BlobLocator, Document, DocumentId, DocumentStatus, LedgerError, SigningTask, StoredEmbed,
    TaskId, TaskStatus, UserId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{
    refresh_document, resolve_in_place, validate_task_set, Resolution, Resolved, Store,
};

const DOCUMENT_COLUMNS: &str = "id, title, description, original_blob, composite_blob, \
     file_name, file_size, status, created_by, created_at, updated_at";

const TASK_COLUMNS: &str =
    "id, document_id, signer_id, ord, status, signed_at, embed, created_at, updated_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file (and any missing parent directories) and runs
    /// migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn conversion(index: usize, ty: Type, msg: impl Into<String>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, ty, msg.into().into())
}

fn id_column<T>(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<T>
where
    T: for<'a> TryFrom<&'a [u8]>,
{
    let bytes: Vec<u8> = row.get(index)?;
    T::try_from(&bytes[..]).map_err(|_| {
        conversion(index, Type::Blob, format!("expected 16-byte id, got {}", bytes.len()))
    })
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let status: String = row.get(7)?;
    Ok(Document {
        id: id_column(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        original_blob: BlobLocator::new(row.get::<_, String>(3)?),
        composite_blob: row.get::<_, Option<String>>(4)?.map(BlobLocator::new),
        file_name: row.get(5)?,
        file_size: row.get::<_, i64>(6)? as u64,
        status: DocumentStatus::from_str(&status)
            .map_err(|e| conversion(7, Type::Text, e.to_string()))?,
        created_by: UserId::new(row.get::<_, String>(8)?),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<SigningTask> {
    let status: String = row.get(4)?;
    let embed: Option<Vec<u8>> = row.get(6)?;
    let embed = embed
        .map(|cbor| {
            ciborium::from_reader::<StoredEmbed, _>(&cbor[..])
                .map_err(|e| conversion(6, Type::Blob, e.to_string()))
        })
        .transpose()?;

    Ok(SigningTask {
        id: id_column(row, 0)?,
        document_id: id_column(row, 1)?,
        signer_id: UserId::new(row.get::<_, String>(2)?),
        order: row.get(3)?,
        status: TaskStatus::from_str(&status)
            .map_err(|e| conversion(4, Type::Text, e.to_string()))?,
        signed_at: row.get(5)?,
        embed,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn encode_embed(embed: Option<&StoredEmbed>) -> Result<Option<Vec<u8>>> {
    embed
        .map(|embed| {
            let mut buf = Vec::new();
            ciborium::into_writer(embed, &mut buf)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            Ok(buf)
        })
        .transpose()
}

fn map_constraint(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(msg.unwrap_or_else(|| "constraint violation".into()))
        }
        other => StoreError::Database(other),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries shared by several operations
// ─────────────────────────────────────────────────────────────────────────────

fn load_document(conn: &Connection, id: &DocumentId) -> Result<Option<Document>> {
    let sql = format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS);
    Ok(conn
        .query_row(&sql, params![id.as_bytes().as_slice()], row_to_document)
        .optional()?)
}

fn load_tasks(conn: &Connection, document_id: &DocumentId) -> Result<Vec<SigningTask>> {
    let sql = format!(
        "SELECT {} FROM signing_tasks WHERE document_id = ?1 ORDER BY ord",
        TASK_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(params![document_id.as_bytes().as_slice()], row_to_task)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

fn insert_tasks(tx: &Transaction<'_>, tasks: &[SigningTask]) -> Result<()> {
    let mut stmt = tx.prepare(&format!(
        "INSERT INTO signing_tasks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        TASK_COLUMNS
    ))?;
    for task in tasks {
        stmt.execute(params![
            task.id.as_bytes().as_slice(),
            task.document_id.as_bytes().as_slice(),
            task.signer_id.as_str(),
            task.order,
            task.status.as_str(),
            task.signed_at,
            encode_embed(task.embed.as_ref())?,
            task.created_at,
            task.updated_at,
        ])
        .map_err(map_constraint)?;
    }
    Ok(())
}

fn write_document_state(tx: &Transaction<'_>, document: &Document) -> Result<()> {
    tx.execute(
        "UPDATE documents SET status = ?1, composite_blob = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            document.status.as_str(),
            document.composite_blob.as_ref().map(|b| b.as_str()),
            document.updated_at,
            document.id.as_bytes().as_slice(),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_document(&self, document: &Document, tasks: &[SigningTask]) -> Result<()> {
        validate_task_set(&document.id, tasks)?;
        let document = document.clone();
        let tasks = tasks.to_vec();

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                &format!(
                    "INSERT INTO documents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    DOCUMENT_COLUMNS
                ),
                params![
                    document.id.as_bytes().as_slice(),
                    document.title,
                    document.description,
                    document.original_blob.as_str(),
                    document.composite_blob.as_ref().map(|b| b.as_str()),
                    document.file_name,
                    document.file_size as i64,
                    document.status.as_str(),
                    document.created_by.as_str(),
                    document.created_at,
                    document.updated_at,
                ],
            )
            .map_err(map_constraint)?;
            insert_tasks(&tx, &tasks)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        let id = *id;
        self.blocking(move |conn| load_document(conn, &id)).await
    }

    async fn blob_referenced(&self, locator: &BlobLocator) -> Result<bool> {
        let locator = locator.as_str().to_string();
        self.blocking(move |conn| {
            let referenced = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM documents \
                 WHERE original_blob = ?1 OR composite_blob = ?1)",
                params![locator],
                |row| row.get(0),
            )?;
            Ok(referenced)
        })
        .await
    }

    async fn documents_created_by(&self, creator: &UserId) -> Result<Vec<Document>> {
        let creator = creator.clone();
        self.blocking(move |conn| {
            let sql = format!(
                "SELECT {} FROM documents WHERE created_by = ?1 ORDER BY created_at DESC",
                DOCUMENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let documents = stmt
                .query_map(params![creator.as_str()], row_to_document)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(documents)
        })
        .await
    }

    async fn attach_tasks(
        &self,
        document_id: &DocumentId,
        tasks: &[SigningTask],
        at: i64,
    ) -> Result<Document> {
        validate_task_set(document_id, tasks)?;
        let document_id = *document_id;
        let tasks = tasks.to_vec();

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut document = load_document(&tx, &document_id)?
                .ok_or_else(|| StoreError::NotFound(format!("document {}", document_id)))?;

            let existing: u32 = tx.query_row(
                "SELECT COUNT(*) FROM signing_tasks WHERE document_id = ?1",
                params![document_id.as_bytes().as_slice()],
                |row| row.get(0),
            )?;
            if existing > 0 {
                return Err(StoreError::Conflict(format!(
                    "document {} already has signers",
                    document_id
                )));
            }

            insert_tasks(&tx, &tasks)?;
            refresh_document(&mut document, &tasks, None, at);
            write_document_state(&tx, &document)?;
            tx.commit()?;
            Ok(document)
        })
        .await
    }

    async fn replace_composite(
        &self,
        document_id: &DocumentId,
        expected: Option<&BlobLocator>,
        composite: &BlobLocator,
        at: i64,
    ) -> Result<Document> {
        let document_id = *document_id;
        let expected = expected.cloned();
        let composite = composite.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            // `IS` compares NULL to NULL as equal.
            let rows = tx.execute(
                "UPDATE documents SET composite_blob = ?1, updated_at = ?2
                 WHERE id = ?3 AND composite_blob IS ?4",
                params![
                    composite.as_str(),
                    at,
                    document_id.as_bytes().as_slice(),
                    expected.as_ref().map(|b| b.as_str()),
                ],
            )?;
            let document = load_document(&tx, &document_id)?
                .ok_or_else(|| StoreError::NotFound(format!("document {}", document_id)))?;
            if rows != 1 {
                return Err(StoreError::Conflict(format!(
                    "composite of document {} changed concurrently",
                    document_id
                )));
            }
            tx.commit()?;
            Ok(document)
        })
        .await
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<SigningTask>> {
        let id = *id;
        self.blocking(move |conn| {
            let sql = format!("SELECT {} FROM signing_tasks WHERE id = ?1", TASK_COLUMNS);
            Ok(conn
                .query_row(&sql, params![id.as_bytes().as_slice()], row_to_task)
                .optional()?)
        })
        .await
    }

    async fn tasks_for_document(&self, document_id: &DocumentId) -> Result<Vec<SigningTask>> {
        let document_id = *document_id;
        self.blocking(move |conn| load_tasks(conn, &document_id)).await
    }

    async fn tasks_for_signer(&self, signer: &UserId) -> Result<Vec<SigningTask>> {
        let signer = signer.clone();
        self.blocking(move |conn| {
            let sql = format!(
                "SELECT {} FROM signing_tasks WHERE signer_id = ?1 ORDER BY created_at, ord",
                TASK_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params![signer.as_str()], row_to_task)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
        .await
    }

    async fn commit_resolution(&self, resolution: &Resolution) -> Result<Resolved> {
        let resolution = resolution.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let document_id: DocumentId = tx
                .query_row(
                    "SELECT document_id FROM signing_tasks WHERE id = ?1",
                    params![resolution.task_id.as_bytes().as_slice()],
                    |row| id_column(row, 0),
                )
                .optional()?
                .ok_or_else(|| StoreError::NotFound(format!("task {}", resolution.task_id)))?;
            let mut document = load_document(&tx, &document_id)?
                .ok_or_else(|| StoreError::NotFound(format!("document {}", document_id)))?;

            // Siblings are re-read inside the transaction so the gate sees
            // every commit that landed before this one.
            let mut tasks = load_tasks(&tx, &document_id)?;
            let index = resolve_in_place(&mut tasks, &resolution)?;
            let task = tasks[index].clone();

            let rows = tx.execute(
                "UPDATE signing_tasks SET status = ?1, signed_at = ?2, embed = ?3, updated_at = ?4
                 WHERE id = ?5 AND status = 'PENDING'",
                params![
                    task.status.as_str(),
                    task.signed_at,
                    encode_embed(task.embed.as_ref())?,
                    task.updated_at,
                    task.id.as_bytes().as_slice(),
                ],
            )?;
            if rows != 1 {
                return Err(LedgerError::AlreadyResolved(task.id).into());
            }

            refresh_document(&mut document, &tasks, resolution.composite.as_ref(), resolution.at);
            write_document_state(&tx, &document)?;
            tx.commit()?;

            tracing::debug!(
                task = %task.id,
                document = %document.id,
                status = %document.status,
                "committed resolution"
            );
            Ok(Resolved { document, task })
        })
        .await
    }
}

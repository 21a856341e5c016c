//! # SignFlow Store
//!
//! Persistence for SignFlow: the [`Store`] trait over documents and signing
//! tasks, and the [`BlobStore`] trait over file bytes.
//!
//! ## Key Types
//!
//! - [`Store`] - async trait for document and ledger persistence
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - in-memory storage for tests
//! - [`BlobStore`] - object storage, with [`MemoryBlobStore`] and [`FsBlobStore`]
//! - [`Resolution`] - one task resolution, committed atomically
//!
//! ## Usage
//!
//! ```rust,no_run
//! use signflow_store::{SqliteStore, Store};
//! use signflow_core::DocumentId;
//!
//! async fn example() -> signflow_store::Result<()> {
//!     let store = SqliteStore::open("signflow.db")?;
//!     let missing = store.get_document(&DocumentId::generate()).await?;
//!     assert!(missing.is_none());
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Compare-and-swap commits**: a task only leaves `PENDING` through
//!   [`Store::commit_resolution`], which re-checks the sequential gate on
//!   freshly read rows inside one transaction.
//! - **Derived status**: document status is rewritten in the same
//!   transaction as the task that changed it.
//! - **Content-addressed blobs**: locators are Blake3 digests.

pub mod blob;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use blob::{content_locator, BlobError, BlobResult, BlobStore, FsBlobStore, MemoryBlobStore};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Outcome, Resolution, Resolved, Store, StoreExt};

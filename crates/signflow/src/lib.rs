//! # SignFlow
//!
//! Sequential multi-party document signing. A creator uploads a PDF and
//! names signers; signers are ranked by organisational title and must act
//! strictly in order. Each visual signature is burned into a composite that
//! is always rebuilt from the untouched original.
//!
//! ## Overview
//!
//! - **Hierarchy**: signers are sorted once, at creation, into orders `1..=N`
//! - **Sequential gate**: order `k` may act only after every lower order signed
//! - **Derived status**: a document's status is a function of its task set
//! - **Compositing**: original + ordered embed log → latest rendering
//!
//! ## Usage
//!
//! ```rust,no_run
//! use signflow::{Decision, NewDocument, StaticDirectory, Workflow, WorkflowConfig};
//! use signflow::core::UserId;
//! use signflow::store::{MemoryBlobStore, SqliteStore};
//!
//! async fn example(pdf: bytes::Bytes) -> signflow::Result<()> {
//!     let directory = StaticDirectory::new()
//!         .with_title("sam", "SENIOR_MANAGER")
//!         .with_title("ana", "ASISTEN_MANAGER");
//!     let workflow = Workflow::new(
//!         SqliteStore::open("signflow.db")?,
//!         MemoryBlobStore::new(),
//!         directory,
//!         WorkflowConfig::default(),
//!     );
//!
//!     let owner = UserId::new("owner");
//!     let original = workflow.upload_original(pdf.clone()).await?;
//!     let request = NewDocument::new("Purchase order", "po.pdf", original, pdf.len() as u64)
//!         .signer("ana", 1)
//!         .signer("sam", 2);
//!     let (_, tasks) = workflow.create_document(&owner, request).await?;
//!
//!     // "sam" outranks "ana", so sam signs first.
//!     workflow
//!         .resolve_signature(&UserId::new("sam"), &tasks[0].id, Decision::Sign(None))
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `signflow::core` - documents, tasks, the ledger, hierarchy sorting
//! - `signflow::composite` - the compositing engine
//! - `signflow::store` - persistence and blob storage

pub mod config;
pub mod directory;
pub mod error;
pub mod workflow;

// Re-export component crates
pub use signflow_composite as composite;
pub use signflow_core as core;
pub use signflow_store as store;

pub use config::WorkflowConfig;
pub use directory::{SignerDirectory, StaticDirectory};
pub use error::{Result, WorkflowError};
pub use workflow::{
    Decision, Download, InboxEntry, NewDocument, Rebuilt, SignatureEmbed, Signed, Workflow,
};

// Re-export commonly used core types
pub use signflow_composite::ReplayWarning;
pub use signflow_core::{
    Document, DocumentId, DocumentStatus, Placement, SignerRequest, SigningTask, TaskId,
    TaskStatus, UserId,
};

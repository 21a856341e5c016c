//! # SignFlow Testkit
//!
//! Testing utilities for SignFlow.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: sample PDFs, signature images, a sample organisation, and
//!   a [`Harness`] wiring a workflow over in-process backends
//! - **Fault injection**: [`FlakyBlobStore`] fails uploads on demand
//! - **Generators**: proptest strategies for task sets, placements and
//!   signer lists
//!
//! The end-to-end scenarios live in this crate's `tests/` directory, and a
//! compositing benchmark in `benches/`.
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use signflow_core::derive_document_status;
//! use signflow_testkit::generators::arbitrary_task_set;
//!
//! proptest! {
//!     #[test]
//!     fn status_is_total(tasks in arbitrary_task_set(6)) {
//!         let _ = derive_document_status(&tasks);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use signflow_testkit::fixtures::{embed_at, Harness};
//!
//! async fn example() {
//!     let harness = Harness::memory();
//!     let (_, tasks) = harness.create(1, &["ana", "sam"]).await.unwrap();
//!     harness.sign("sam", &tasks[0], Some(embed_at(1, 72.0, 600.0))).await.unwrap();
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    embed_at, init_tracing, jpeg_signature, org_directory, placement, png_signature, sample_pdf,
    FlakyBlobStore, GatedStore, Harness, TestWorkflow,
};
pub use generators::{arbitrary_task_set, reachable_task_set, stored_embed, SignerParams};

//! # SignFlow Core
//!
//! Pure primitives for SignFlow: documents, signing tasks, the ledger state
//! machine, and hierarchy ordering.
//!
//! This crate contains no I/O, no storage, no PDF handling. It is pure
//! computation over the signing chain.
//!
//! ## Key Types
//!
//! - [`Document`] - An uploaded file moving through the chain
//! - [`SigningTask`] - One signer's obligation, with a fixed `order`
//! - [`StoredEmbed`] - A replayable visual signature
//! - [`RankTable`] - Title → priority mapping used by [`sort_signers`]
//!
//! ## The Sequential Gate
//!
//! A task may leave `Pending` only when every lower-order task on its
//! document is `Signed`. See the [`ledger`] module.

pub mod document;
pub mod error;
pub mod hierarchy;
pub mod ledger;
pub mod task;
pub mod types;

pub use document::{Document, DocumentStatus};
pub use error::{CoreError, LedgerError};
pub use hierarchy::{sort_signers, RankTable, SignerRequest, SignerSlot, UNRANKED};
pub use ledger::{
    apply_rejected, apply_signed, can_transition, check_transition, derive_document_status,
    orders_are_contiguous, replay_log,
};
pub use task::{Placement, SigningTask, StoredEmbed, TaskStatus};
pub use types::{now_millis, BlobLocator, DocumentId, TaskId, UserId};

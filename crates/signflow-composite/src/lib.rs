//! # SignFlow Composite
//!
//! The compositing engine: draws every visual signature in a document's
//! signing log onto the original PDF.
//!
//! ## Overview
//!
//! Composites are materialized views. Each one is rebuilt from the
//! immutable original plus the ordered log of [`StoredEmbed`]s, never by
//! editing a previously composited file:
//!
//! 1. Parse the original into pages (embed pages are 1-indexed)
//! 2. Replay each historical embed, skipping and reporting failures
//! 3. Draw the new embed; any failure here fails the call
//! 4. Serialize
//!
//! Embed coordinates use a top-left origin; the engine flips them into PDF
//! user space with `y' = page_height - y - height`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use signflow_composite::Compositor;
//! use signflow_core::StoredEmbed;
//!
//! fn sign(original: &[u8], log: &[&StoredEmbed], new: &StoredEmbed) {
//!     let out = Compositor::default().composite(original, log, new).unwrap();
//!     for warning in &out.warnings {
//!         eprintln!("{warning}");
//!     }
//! }
//! ```
//!
//! [`StoredEmbed`]: signflow_core::StoredEmbed

pub mod canvas;
pub mod decode;
pub mod engine;
pub mod error;
pub mod inspect;

pub use canvas::{Canvas, PageBox};
pub use decode::{decode_image, EmbedRecord, ImageFormat};
pub use engine::{Composite, CompositeConfig, Compositor, DEFAULT_MAX_IMAGE_BYTES};
pub use error::{CompositeError, ReplayWarning, Result};
pub use inspect::{drawn_images, DrawnImage};

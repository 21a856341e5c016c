//! The compositing engine.
//!
//! Every composite is rebuilt from the untouched original plus the ordered
//! log of embeds. The previously cached composite is never used as a base,
//! so a lost or corrupt cache can always be regenerated.

use bytes::Bytes;
use signflow_core::StoredEmbed;

use crate::canvas::Canvas;
use crate::decode::EmbedRecord;
use crate::error::{ReplayWarning, Result};

/// Default cap on a single decoded signature image.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

/// Configuration for the compositor.
#[derive(Debug, Clone)]
pub struct CompositeConfig {
    /// Largest raw image payload accepted per embed.
    pub max_image_bytes: usize,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Output of a compositing run.
#[derive(Debug, Clone)]
pub struct Composite {
    /// The new PDF.
    pub bytes: Bytes,
    /// Historical embeds that could not be redrawn.
    pub warnings: Vec<ReplayWarning>,
}

/// Draws signature embeds onto PDFs.
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    config: CompositeConfig,
}

impl Compositor {
    pub fn new(config: CompositeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompositeConfig {
        &self.config
    }

    /// Replay `applied` in order, then draw `new`.
    ///
    /// A historical embed that fails is skipped and reported in
    /// [`Composite::warnings`]. Failure on `new` fails the whole call.
    pub fn composite(
        &self,
        original: &[u8],
        applied: &[&StoredEmbed],
        new: &StoredEmbed,
    ) -> Result<Composite> {
        // Decode first: a bad new embed should not cost a full replay.
        let record = EmbedRecord::from_stored(new, self.config.max_image_bytes)?;

        let mut canvas = Canvas::load(original)?;
        let warnings = self.replay(&mut canvas, applied);
        canvas.draw(&record)?;

        Ok(Composite {
            bytes: canvas.finish()?,
            warnings,
        })
    }

    /// Regenerate a composite from the original and the log alone.
    pub fn rebuild(&self, original: &[u8], applied: &[&StoredEmbed]) -> Result<Composite> {
        let mut canvas = Canvas::load(original)?;
        let warnings = self.replay(&mut canvas, applied);
        Ok(Composite {
            bytes: canvas.finish()?,
            warnings,
        })
    }

    fn replay(&self, canvas: &mut Canvas, applied: &[&StoredEmbed]) -> Vec<ReplayWarning> {
        applied
            .iter()
            .enumerate()
            .filter_map(|(index, embed)| {
                let drawn = EmbedRecord::from_stored(embed, self.config.max_image_bytes)
                    .and_then(|record| canvas.draw(&record));
                drawn.err().map(|e| {
                    let warning = ReplayWarning {
                        index,
                        page: embed.position.page,
                        applied_at: embed.applied_at,
                        reason: e.to_string(),
                    };
                    tracing::warn!(%warning, "skipping historical signature during replay");
                    warning
                })
            })
            .collect()
    }
}

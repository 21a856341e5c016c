//! Turning stored embeds into drawable records.

use base64::{engine::general_purpose, Engine as _};
use signflow_core::{Placement, StoredEmbed};

use crate::error::{CompositeError, Result};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Raster formats the engine can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub(crate) fn to_image_format(self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

/// A decoded embed, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedRecord {
    pub placement: Placement,
    pub image: Vec<u8>,
    pub format: ImageFormat,
}

impl EmbedRecord {
    /// Decode a stored embed, enforcing `max_image_bytes` on the raw image.
    pub fn from_stored(embed: &StoredEmbed, max_image_bytes: usize) -> Result<Self> {
        embed.position.validate()?;
        let (image, format) = decode_image(&embed.image)?;
        if image.len() > max_image_bytes {
            return Err(CompositeError::ImageTooLarge {
                size: image.len(),
                limit: max_image_bytes,
            });
        }
        Ok(Self {
            placement: embed.position,
            image,
            format,
        })
    }
}

/// Decode a base64 image payload, optionally wrapped in a data URL.
///
/// The format comes from the data-URL marker: anything mentioning `png` is
/// PNG, every other marker is JPEG. Without a marker the PNG signature
/// picks PNG and everything else is treated as JPEG. The bytes themselves
/// are only validated later, when the image is decoded for drawing.
pub fn decode_image(payload: &str) -> Result<(Vec<u8>, ImageFormat)> {
    let (marker, data) = match payload.split_once(',') {
        Some((head, data)) if head.trim_start().starts_with("data:") => (Some(head), data),
        _ => (None, payload),
    };

    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| CompositeError::Base64(e.to_string()))?;

    let format = match marker {
        Some(marker) if marker.to_ascii_lowercase().contains("png") => ImageFormat::Png,
        Some(_) => ImageFormat::Jpeg,
        None if bytes.starts_with(PNG_SIGNATURE) => ImageFormat::Png,
        None => ImageFormat::Jpeg,
    };

    Ok((bytes, format))
}

//! A loaded PDF that embeds can be drawn onto.

use bytes::Bytes;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::decode::EmbedRecord;
use crate::error::{CompositeError, Result};

/// Parent chains deeper than this are treated as malformed.
const MAX_PAGE_TREE_DEPTH: usize = 32;

/// A page's visible rectangle in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub left: f32,
    pub bottom: f32,
    pub width: f32,
    pub height: f32,
}

impl PageBox {
    /// Map a top-left-origin rectangle to the bottom-left origin PDF uses.
    ///
    /// Returns `(x, y)` of the rectangle's lower-left corner.
    pub fn to_user_space(&self, x: f32, y: f32, height: f32) -> (f32, f32) {
        (self.left + x, self.bottom + self.height - y - height)
    }
}

/// An editable PDF with its page list resolved.
pub struct Canvas {
    doc: Document,
    /// Page object ids, 0-indexed.
    pages: Vec<ObjectId>,
}

impl Canvas {
    /// Parse PDF bytes.
    pub fn load(pdf: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(pdf)?;
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(CompositeError::Pdf("document has no pages".into()));
        }
        Ok(Self { doc, pages })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub(crate) fn document(&self) -> &Document {
        &self.doc
    }

    pub(crate) fn page_ids(&self) -> &[ObjectId] {
        &self.pages
    }

    /// Resolve a 1-indexed page number.
    fn page_id(&self, page: u32) -> Result<ObjectId> {
        page.checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .copied()
            .ok_or(CompositeError::PageOutOfRange {
                page,
                pages: self.pages.len(),
            })
    }

    /// The MediaBox of a 1-indexed page, following inheritance.
    pub fn page_box(&self, page: u32) -> Result<PageBox> {
        media_box(&self.doc, self.page_id(page)?)
    }

    /// Burn one embed into its page.
    pub fn draw(&mut self, record: &EmbedRecord) -> Result<()> {
        let placement = &record.placement;
        let page_id = self.page_id(placement.page)?;
        let page_box = media_box(&self.doc, page_id)?;
        let (x, y) = page_box.to_user_space(placement.x, placement.y, placement.height);

        let image_id = add_image(&mut self.doc, record)?;
        let name = format!("SigImg{}", image_id.0);
        install_xobject(&mut self.doc, page_id, name.as_bytes(), image_id)?;

        let overlay = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        real(placement.width),
                        Object::Integer(0),
                        Object::Integer(0),
                        real(placement.height),
                        real(x),
                        real(y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(name.into_bytes())]),
                Operation::new("Q", vec![]),
            ],
        }
        .encode()?;
        append_content(&mut self.doc, page_id, overlay)?;

        tracing::debug!(
            page = placement.page,
            x,
            y,
            width = placement.width,
            height = placement.height,
            "drew signature image"
        );
        Ok(())
    }

    /// Serialize the edited document.
    pub fn finish(mut self) -> Result<Bytes> {
        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| CompositeError::Pdf(e.to_string()))?;
        Ok(Bytes::from(out))
    }
}

/// Decode the raster and add it (plus its soft mask) as an image XObject.
fn add_image(doc: &mut Document, record: &EmbedRecord) -> Result<ObjectId> {
    let decoded = image::load_from_memory_with_format(&record.image, record.format.to_image_format())
        .map_err(|e| CompositeError::ImageDecode(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();

    let pixel_count = (width as usize) * (height as usize);
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    let mut dict = image_dict(width, height, "DeviceRGB");
    if alpha.iter().any(|&a| a != u8::MAX) {
        let mut mask = Stream::new(image_dict(width, height, "DeviceGray"), alpha);
        // Left uncompressed if compression fails.
        let _ = mask.compress();
        let mask_id = doc.add_object(mask);
        dict.set("SMask", mask_id);
    }

    let mut stream = Stream::new(dict, rgb);
    let _ = stream.compress();
    Ok(doc.add_object(stream))
}

fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => Object::Integer(width as i64),
        "Height" => Object::Integer(height as i64),
        "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
        "BitsPerComponent" => Object::Integer(8),
    }
}

/// Look up `key` on the page or the nearest ancestor that has it.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Result<Option<&'a Object>> {
    let mut current = Some(page_id);
    for _ in 0..=MAX_PAGE_TREE_DEPTH {
        let Some(id) = current else { break };
        let dict = doc.get_dictionary(id)?;
        if let Ok(obj) = dict.get(key) {
            return Ok(Some(obj));
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(None)
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Dictionary> {
    match obj {
        Object::Reference(id) => Ok(doc.get_dictionary(*id)?),
        other => Ok(other.as_dict()?),
    }
}

/// Find the MediaBox on the page or the nearest ancestor that has one.
fn media_box(doc: &Document, page_id: ObjectId) -> Result<PageBox> {
    match inherited(doc, page_id, b"MediaBox")? {
        Some(obj) => parse_rect(doc, obj),
        None => Err(CompositeError::Pdf(format!(
            "page {:?} has no MediaBox",
            page_id
        ))),
    }
}

/// Register `image_id` under `name` in the page's own resources.
///
/// The resources in effect (inherited from a `Pages` node or shared by
/// reference) are copied onto the page first: the original content keeps
/// resolving its fonts and XObjects, and no other page gains the entry.
fn install_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    name: &[u8],
    image_id: ObjectId,
) -> Result<()> {
    let mut resources = match inherited(doc, page_id, b"Resources")? {
        Some(obj) => resolve_dict(doc, obj)?.clone(),
        None => Dictionary::new(),
    };
    let mut xobjects = match resources.get(b"XObject") {
        Ok(obj) => resolve_dict(doc, obj)?.clone(),
        Err(_) => Dictionary::new(),
    };
    xobjects.set(name.to_vec(), Object::Reference(image_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Draw `overlay` after the page's existing content.
///
/// Existing streams are left untouched, since another page may share them.
/// They are bracketed by new `q` and `Q` streams so a graphics state they
/// leave behind cannot skew the overlay.
fn append_content(doc: &mut Document, page_id: ObjectId, overlay: Vec<u8>) -> Result<()> {
    let existing = content_refs(doc, page_id)?;

    let mut contents = Vec::with_capacity(existing.len() + 2);
    if existing.is_empty() {
        contents.push(doc.add_object(Stream::new(dictionary! {}, overlay)).into());
    } else {
        contents.push(doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec())).into());
        contents.extend(existing);
        let mut tail = b"\nQ\n".to_vec();
        tail.extend_from_slice(&overlay);
        contents.push(doc.add_object(Stream::new(dictionary! {}, tail)).into());
    }

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// The page's content streams as a flat list of references.
fn content_refs(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page = doc.get_dictionary(page_id)?;
    let Ok(contents) = page.get(b"Contents") else {
        return Ok(Vec::new());
    };
    let resolved = match contents {
        Object::Reference(id) => doc.get_object(*id)?,
        other => other,
    };
    Ok(match resolved {
        Object::Array(items) => items.clone(),
        Object::Stream(_) => vec![contents.clone()],
        _ => Vec::new(),
    })
}

fn parse_rect(doc: &Document, obj: &Object) -> Result<PageBox> {
    let obj = match obj {
        Object::Reference(id) => doc.get_object(*id)?,
        other => other,
    };
    let values: Vec<f32> = obj
        .as_array()?
        .iter()
        .filter_map(number)
        .collect();
    match values[..] {
        [x0, y0, x1, y1] => Ok(PageBox {
            left: x0.min(x1),
            bottom: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }),
        _ => Err(CompositeError::Pdf("malformed MediaBox".into())),
    }
}

/// Numeric value of an integer or real object.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn real(value: f32) -> Object {
    Object::Real(value.into())
}

//! Reading image placements back out of a composite.
//!
//! Used to audit that a composite shows every signature in the log.

use lopdf::content::Content;

use crate::canvas::{number, Canvas};
use crate::error::Result;

/// One image draw found in a page's content stream.
///
/// Coordinates are converted back to the top-left origin embeds use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawnImage {
    /// 1-indexed page.
    pub page: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Every `cm` + `Do` image placement on every page, in drawing order.
pub fn drawn_images(pdf: &[u8]) -> Result<Vec<DrawnImage>> {
    let canvas = Canvas::load(pdf)?;
    let doc = canvas.document();
    let mut found = Vec::new();

    for (index, &page_id) in canvas.page_ids().iter().enumerate() {
        let page_number = index as u32 + 1;
        let page_box = canvas.page_box(page_number)?;
        let content = Content::decode(&doc.get_page_content(page_id)?)?;

        for pair in content.operations.windows(2) {
            if pair[0].operator != "cm" || pair[1].operator != "Do" {
                continue;
            }
            let m: Vec<f32> = pair[0].operands.iter().filter_map(number).collect();
            if let [width, _, _, height, x, y] = m[..] {
                found.push(DrawnImage {
                    page: page_number,
                    x: x - page_box.left,
                    y: page_box.bottom + page_box.height - y - height,
                    width,
                    height,
                });
            }
        }
    }

    Ok(found)
}

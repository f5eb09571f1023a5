//! In-memory test documents.

use crate::PageSize;
use doc_model::PageRect;
use lopdf::{dictionary, Document, Object, Stream};

/// Builds a PDF with one page per entry in `sizes`. Every page carries its own
/// `/Resources` with a Helvetica `/F1` and a short text line.
pub fn blank_pdf(sizes: &[PageSize]) -> Vec<u8> {
    let boxes: Vec<PageBoxes> = sizes.iter().map(|size| PageBoxes::sized(*size)).collect();
    build(&boxes, false)
}

/// Same as [`blank_pdf`] but `/Resources` and `/MediaBox` live on the page
/// tree root and are inherited by the pages.
pub fn inherited_pdf(pages: usize, size: PageSize) -> Vec<u8> {
    build(&vec![PageBoxes::sized(size); pages], true)
}

/// One page whose `/MediaBox` (and optional `/CropBox`) need not start at the origin.
pub fn boxed_pdf(media: PageRect, crop: Option<PageRect>) -> Vec<u8> {
    build(&[PageBoxes { media, crop }], false)
}

#[derive(Debug, Clone, Copy)]
struct PageBoxes {
    media: PageRect,
    crop: Option<PageRect>,
}

impl PageBoxes {
    fn sized(size: PageSize) -> Self {
        Self { media: PageRect { x0: 0.0, y0: 0.0, x1: size.width_pt, y1: size.height_pt }, crop: None }
    }
}

/// `pages` US-letter pages (612×792 pt).
pub fn letter_pdf(pages: usize) -> Vec<u8> {
    blank_pdf(&vec![PageSize::default(); pages])
}

fn build(pages: &[PageBoxes], inherit: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources = dictionary! {
        "Font" => dictionary! { "F1" => Object::Reference(font_id) },
    };

    let mut page_ids = Vec::with_capacity(pages.len());
    for (index, boxes) in pages.iter().enumerate() {
        let content = format!(
            "BT /F1 12 Tf {} {} Td (Page {}) Tj ET",
            boxes.media.x0 + 72.0,
            boxes.media.y0 + 72.0,
            index + 1
        );
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let mut page = dictionary! {
            "Type" => "Page",
            "Contents" => Object::Reference(content_id),
        };
        if !inherit {
            page.set("MediaBox", box_array(boxes.media));
            page.set("Resources", resources.clone());
        }
        if let Some(crop) = boxes.crop {
            page.set("CropBox", box_array(crop));
        }
        page_ids.push(doc.add_object(page));
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    let mut tree = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(pages.len() as i64),
    };
    if inherit {
        let media = pages.first().map(|boxes| boxes.media).unwrap_or(PageBoxes::sized(PageSize::default()).media);
        tree.set("MediaBox", box_array(media));
        tree.set("Resources", resources);
    }
    let pages_id = doc.add_object(tree);

    for page_id in &page_ids {
        if let Ok(dict) = doc.get_object_mut(*page_id).and_then(Object::as_dict_mut) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("in-memory save should succeed");
    bytes
}

fn box_array(rect: PageRect) -> Vec<Object> {
    vec![Object::Real(rect.x0), Object::Real(rect.y0), Object::Real(rect.x1), Object::Real(rect.y1)]
}

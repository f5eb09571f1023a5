pub mod export;
mod fonts;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use doc_model::{PageBox, PageSize};
pub use export::{export_to_path, ExportError, ExportReport};
pub use fonts::StandardFont;

use doc_model::PageRect;
use image::{ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Guards against cyclic `/Parent` chains in malformed files.
const MAX_INHERITANCE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

/// Bounding box a thumbnail is shrunk into; the page aspect ratio is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub width_px: u32,
    pub height_px: u32,
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self { width_px: 140, height_px: 180 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
}

pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    /// Visible area of the page in its own user space.
    fn page_box(&self, handle: DocumentHandle, page_index: u32) -> Result<PageBox, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        Ok(self.page_box(handle, page_index)?.size)
    }
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn render_thumbnail(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        target: ThumbnailSize,
    ) -> Result<RgbaImage, PdfEngineError>;
    /// The bytes the document was opened from; export composes a copy of them.
    fn source_bytes(&self, handle: DocumentHandle) -> Result<&[u8], PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    bytes: Vec<u8>,
    page_boxes: Vec<PageBox>,
}

/// Engine backed by `lopdf`. Rasters are page-sized placeholders: white
/// canvas with a light border, enough to drive layout and hit-testing.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_boxes(bytes: &[u8]) -> Result<Vec<PageBox>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let boxes: Vec<PageBox> = doc
            .get_pages()
            .into_values()
            .map(|page_id| visible_box(&doc, page_id).unwrap_or_default())
            .collect();

        if boxes.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        Ok(boxes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_boxes = Self::parse_boxes(&bytes)?;
        log::info!("opened document with {} page(s)", page_boxes.len());

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, DocumentRecord { bytes, page_boxes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_boxes.len() as u32)
    }

    fn page_box(&self, handle: DocumentHandle, page_index: u32) -> Result<PageBox, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_boxes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_boxes.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let scale = if request.scale > 0.0 && request.scale.is_finite() { request.scale } else { 1.0 };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        log::debug!("rendered page {} at scale {scale}: {width}x{height}", request.page_index);
        Ok(image)
    }

    fn render_thumbnail(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        target: ThumbnailSize,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page = self.render_page(handle, RenderRequest { page_index, scale: 0.5 })?;
        let (width, height) =
            shrink_to_fit(page.width(), page.height(), target.width_px, target.height_px);

        if (width, height) == page.dimensions() {
            return Ok(page);
        }

        Ok(image::imageops::thumbnail(&page, width, height))
    }

    fn source_bytes(&self, handle: DocumentHandle) -> Result<&[u8], PdfEngineError> {
        Ok(&self.record(handle)?.bytes)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

/// Shrinks `width`×`height` to fit inside `max_width`×`max_height` keeping the
/// aspect ratio. Never enlarges; every result dimension is at least 1.
pub fn shrink_to_fit(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let max_width = max_width.max(1);
    let max_height = max_height.max(1);

    if width <= max_width && height <= max_height {
        return (width.max(1), height.max(1));
    }

    let ratio = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    let fitted_width = ((width as f64 * ratio).round() as u32).clamp(1, max_width);
    let fitted_height = ((height as f64 * ratio).round() as u32).clamp(1, max_height);

    (fitted_width, fitted_height)
}

/// The page's `/CropBox` clipped to its `/MediaBox`, or the `/MediaBox` alone.
/// Both are looked up through inherited attributes.
pub(crate) fn visible_box(doc: &Document, page_id: ObjectId) -> Option<PageBox> {
    let media = inherited_box(doc, page_id, b"MediaBox");
    let crop = inherited_box(doc, page_id, b"CropBox");

    let rect = match (crop, media) {
        (Some(crop), Some(media)) => crop.intersection(&media).unwrap_or(media),
        (crop, media) => crop.or(media)?,
    };
    PageBox::from_rect(rect)
}

fn inherited_box(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<PageRect> {
    let mut current = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_INHERITANCE_DEPTH {
        let rect = current
            .get(key)
            .ok()
            .and_then(|obj| doc.dereference(obj).ok())
            .and_then(|(_, obj)| obj.as_array().ok())
            .and_then(|array| rect_from_array(array));
        if rect.is_some() {
            return rect;
        }

        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }

    None
}

fn rect_from_array(array: &[Object]) -> Option<PageRect> {
    let [x0, y0, x1, y1] = array else {
        return None;
    };
    let rect = PageRect {
        x0: x0.as_float().ok()?,
        y0: y0.as_float().ok()?,
        x1: x1.as_float().ok()?,
        y1: y1.as_float().ok()?,
    };
    PageBox::from_rect(rect).map(|page| page.rect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{blank_pdf, boxed_pdf, letter_pdf};

    #[test]
    fn opens_pdf_and_reads_page_count() {
        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(letter_pdf(2))).expect("open should succeed");

        assert_eq!(engine.page_count(handle).expect("count should succeed"), 2);
        assert_eq!(
            engine.page_size(handle, 1).expect("size should resolve"),
            PageSize { width_pt: 612.0, height_pt: 792.0 }
        );
    }

    #[test]
    fn page_sizes_follow_each_media_box() {
        let sizes = [
            PageSize { width_pt: 595.0, height_pt: 842.0 },
            PageSize { width_pt: 842.0, height_pt: 595.0 },
        ];
        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(blank_pdf(&sizes))).unwrap();

        assert_eq!(engine.page_size(handle, 0).unwrap(), sizes[0]);
        assert_eq!(engine.page_size(handle, 1).unwrap(), sizes[1]);
        assert!(matches!(
            engine.page_size(handle, 2),
            Err(PdfEngineError::PageOutOfRange { page: 2, page_count: 2 })
        ));
    }

    #[test]
    fn page_box_keeps_the_media_box_origin() {
        let media = PageRect { x0: 100.0, y0: 100.0, x1: 712.0, y1: 892.0 };
        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(boxed_pdf(media, None))).unwrap();

        let page = engine.page_box(handle, 0).unwrap();
        assert_eq!(page.rect(), media);
        assert_eq!(engine.page_size(handle, 0).unwrap(), PageSize::default());
    }

    #[test]
    fn crop_box_wins_and_is_clipped_to_the_media_box() {
        let media = PageRect { x0: 0.0, y0: 0.0, x1: 612.0, y1: 792.0 };
        let crop = PageRect { x0: 50.0, y0: 60.0, x1: 700.0, y1: 500.0 };
        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(boxed_pdf(media, Some(crop)))).unwrap();

        assert_eq!(
            engine.page_box(handle, 0).unwrap().rect(),
            PageRect { x0: 50.0, y0: 60.0, x1: 612.0, y1: 500.0 }
        );
    }

    #[test]
    fn render_page_scales_dimensions() {
        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(letter_pdf(1))).unwrap();

        let image = engine.render_page(handle, RenderRequest { page_index: 0, scale: 0.5 }).unwrap();
        assert_eq!(image.dimensions(), (306, 396));
    }

    #[test]
    fn render_thumbnail_keeps_aspect_ratio() {
        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(letter_pdf(1))).expect("open should succeed");

        let image = engine
            .render_thumbnail(handle, 0, ThumbnailSize { width_px: 140, height_px: 180 })
            .expect("thumbnail should render");

        assert_eq!(image.height(), 180);
        assert_eq!(image.width(), 139);
    }

    #[test]
    fn shrink_to_fit_never_enlarges() {
        assert_eq!(shrink_to_fit(100, 50, 500, 500), (100, 50));
        assert_eq!(shrink_to_fit(1000, 500, 500, 500), (500, 250));
        assert_eq!(shrink_to_fit(10, 10_000, 100, 100), (1, 100));
    }

    #[test]
    fn source_bytes_are_retained_until_close() {
        let bytes = letter_pdf(1);
        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(bytes.clone())).unwrap();

        assert_eq!(engine.source_bytes(handle).unwrap(), bytes.as_slice());
        engine.close(handle).unwrap();
        assert!(matches!(engine.source_bytes(handle), Err(PdfEngineError::InvalidHandle(_))));
    }

    #[test]
    fn invalid_bytes_fail_to_parse() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::Bytes(b"not a pdf".to_vec()))
            .expect_err("garbage should not open");

        assert!(matches!(err, PdfEngineError::Parse(_)));
    }

    #[test]
    fn encrypted_marker_is_rejected() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::Bytes(b"%PDF-1.4\n/Encrypt 5 0 R\n".to_vec()))
            .expect_err("encrypted marker should be rejected");

        assert!(matches!(err, PdfEngineError::EncryptedUnsupported));
    }

    #[test]
    fn invalid_handle_returns_error() {
        let engine = LopdfEngine::new();
        let err =
            engine.page_count(DocumentHandle(999)).expect_err("should fail for unknown handle");

        assert!(matches!(err, PdfEngineError::InvalidHandle(999)));
    }
}

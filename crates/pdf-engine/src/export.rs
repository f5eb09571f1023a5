//! Burns overlays into a copy of a document.
//!
//! Redactions become filled black rectangles and text annotations become real
//! text objects in standard fonts. Overlays are painted after the page's own
//! content, each inside its own saved graphics state, so nothing the page does
//! to the CTM or colors can displace them.

use crate::fonts::{encode_win_ansi, encode_win_ansi_lossy};
use crate::StandardFont;
use doc_model::{OverlayStore, PageOverlays, PagePoint, PageRect, TextAnnotation};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

/// Distance from the top of a text box to its baseline, as a fraction of the
/// font size. Approximation; it is not derived from font metrics.
pub const BASELINE_RATIO: f32 = 0.8;

const MAX_INHERITANCE_DEPTH: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("overlay on page {page} but the document has {page_count} page(s)")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("character {ch:?} cannot be encoded in {font}")]
    Unencodable { ch: char, font: &'static str },
}

/// Summary of a finished export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub pages: u32,
    pub redactions: usize,
    pub texts: usize,
    /// Texts that only succeeded on the fallback font.
    pub recovered_texts: usize,
    pub skipped_texts: usize,
}

/// Text ready to be painted. The first line sits on `baseline`; every further
/// line is one font size lower.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun<'a> {
    pub baseline: PagePoint,
    pub text: &'a str,
    pub font: StandardFont,
    pub size: f32,
    pub color: (f32, f32, f32),
    /// Replace unencodable characters instead of failing.
    pub lossy: bool,
}

/// Drawing surface for one page's overlays.
pub trait OverlayCanvas {
    fn fill_rect(&mut self, rect: PageRect) -> Result<(), ExportError>;
    fn draw_text(&mut self, run: &TextRun<'_>) -> Result<(), ExportError>;
}

/// Baseline origin for a text annotation anchored at its top-left corner.
pub fn baseline_for(text: &TextAnnotation) -> PagePoint {
    PagePoint::new(text.anchor.x, text.anchor.y - text.style.size * BASELINE_RATIO)
}

/// Paints one page's overlays. Redaction failures abort; a text that fails is
/// retried once with the default font and skipped if that fails too.
pub fn paint_page<C: OverlayCanvas>(
    canvas: &mut C,
    overlays: &PageOverlays,
    report: &mut ExportReport,
) -> Result<(), ExportError> {
    for redaction in overlays.redactions() {
        canvas.fill_rect(redaction.rect)?;
        report.redactions += 1;
    }

    for text in overlays.texts() {
        let run = TextRun {
            baseline: baseline_for(text),
            text: &text.text,
            font: StandardFont::from(text.style.font),
            size: text.style.size,
            color: text.style.color.to_normalized(),
            lossy: false,
        };

        let Err(first) = canvas.draw_text(&run) else {
            report.texts += 1;
            continue;
        };
        log::warn!("text overlay {:?} failed with {}: {first}", text.id, run.font.base_font());

        let fallback = TextRun { font: StandardFont::DEFAULT, lossy: true, ..run };
        match canvas.draw_text(&fallback) {
            Ok(()) => {
                report.texts += 1;
                report.recovered_texts += 1;
            }
            Err(second) => {
                log::warn!("skipping text overlay {:?}: {second}", text.id);
                report.skipped_texts += 1;
            }
        }
    }

    Ok(())
}

/// Composes `overlays` into a copy of `source` and returns the new file bytes.
pub fn compose(source: &[u8], overlays: &OverlayStore) -> Result<(Vec<u8>, ExportReport), ExportError> {
    let mut doc = Document::load_mem(source)?;
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    let mut report = ExportReport { pages: page_count, ..ExportReport::default() };

    if let Some(page) = overlays.pages().find(|page| *page >= page_count) {
        return Err(ExportError::PageOutOfRange { page, page_count });
    }

    let mut font_ids = BTreeMap::new();
    for page_index in overlays.pages() {
        let (Some(page_overlays), Some(page_id)) =
            (overlays.page(page_index), pages.get(&(page_index + 1)).copied())
        else {
            continue;
        };

        let mut composer = PageComposer::default();
        paint_page(&mut composer, page_overlays, &mut report)?;
        composer.apply(&mut doc, page_id, &mut font_ids)?;
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;

    Ok((bytes, report))
}

/// Composes and writes to `path`. The target is only replaced once the whole
/// document has been composed and written to a sibling temporary file.
pub fn export_to_path(
    source: &[u8],
    overlays: &OverlayStore,
    path: &Path,
) -> Result<ExportReport, ExportError> {
    let (bytes, report) = compose(source, overlays)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(&bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| err.error)?;

    log::info!(
        "exported {} page(s) to {} ({} redaction(s), {} text(s), {} skipped)",
        report.pages,
        path.display(),
        report.redactions,
        report.texts,
        report.skipped_texts
    );

    Ok(report)
}

#[derive(Debug, Default)]
struct PageComposer {
    operations: Vec<Operation>,
    fonts: BTreeSet<StandardFont>,
}

impl OverlayCanvas for PageComposer {
    fn fill_rect(&mut self, rect: PageRect) -> Result<(), ExportError> {
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("rg", vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)]),
            Operation::new(
                "re",
                vec![
                    Object::Real(rect.x0),
                    Object::Real(rect.y0),
                    Object::Real(rect.width()),
                    Object::Real(rect.height()),
                ],
            ),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }

    fn draw_text(&mut self, run: &TextRun<'_>) -> Result<(), ExportError> {
        // Every line is encoded before anything is emitted, so a failed run
        // leaves no partial text behind for the retry to duplicate.
        let lines = run
            .text
            .lines()
            .map(|line| {
                if run.lossy {
                    Ok(encode_win_ansi_lossy(line))
                } else {
                    encode_win_ansi(line)
                        .map_err(|ch| ExportError::Unencodable { ch, font: run.font.base_font() })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        let (r, g, b) = run.color;

        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(run.font.resource_name().as_bytes().to_vec()), Object::Real(run.size)],
            ),
            Operation::new("TL", vec![Object::Real(run.size)]),
            Operation::new("rg", vec![Object::Real(r), Object::Real(g), Object::Real(b)]),
            Operation::new("Td", vec![Object::Real(run.baseline.x), Object::Real(run.baseline.y)]),
        ]);
        for (index, line) in lines.into_iter().enumerate() {
            if index > 0 {
                self.operations.push(Operation::new("T*", vec![]));
            }
            if !line.is_empty() {
                self.operations.push(Operation::new("Tj", vec![Object::String(line, StringFormat::Literal)]));
            }
        }
        self.operations.extend([Operation::new("ET", vec![]), Operation::new("Q", vec![])]);
        self.fonts.insert(run.font);
        Ok(())
    }
}

impl PageComposer {
    fn apply(
        self,
        doc: &mut Document,
        page_id: ObjectId,
        font_ids: &mut BTreeMap<StandardFont, ObjectId>,
    ) -> Result<(), ExportError> {
        if self.operations.is_empty() {
            return Ok(());
        }

        let mut fonts = Vec::with_capacity(self.fonts.len());
        for font in &self.fonts {
            let id = *font_ids.entry(*font).or_insert_with(|| {
                doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => font.base_font(),
                    "Encoding" => "WinAnsiEncoding",
                })
            });
            fonts.push((*font, id));
        }
        if !fonts.is_empty() {
            register_fonts(doc, page_id, &fonts)?;
        }

        let mut overlay = b"\nQ\nq\n".to_vec();
        overlay.extend(Content { operations: self.operations }.encode()?);
        overlay.extend_from_slice(b"\nQ\n");

        let mut contents = existing_contents(doc, page_id)?;
        let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));
        contents.insert(0, Object::Reference(open_id));
        contents.push(Object::Reference(overlay_id));

        doc.get_object_mut(page_id)?.as_dict_mut()?.set("Contents", Object::Array(contents));
        Ok(())
    }
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, ExportError> {
    let contents = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    Ok(contents)
}

/// Adds `fonts` to the page's `/Font` resources. A page without its own
/// `/Resources` gets a copy of the inherited ones first.
fn register_fonts(
    doc: &mut Document,
    page_id: ObjectId,
    fonts: &[(StandardFont, ObjectId)],
) -> Result<(), ExportError> {
    let indirect_resources = match doc.get_dictionary(page_id)?.get(b"Resources") {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(Object::Dictionary(_)) => None,
        _ => {
            let inherited = inherited_resources(doc, page_id);
            doc.get_object_mut(page_id)?.as_dict_mut()?.set("Resources", inherited);
            None
        }
    };

    let indirect_fonts = {
        let resources = match indirect_resources {
            Some(id) => doc.get_dictionary(id)?,
            None => doc.get_dictionary(page_id)?.get(b"Resources")?.as_dict()?,
        };
        match resources.get(b"Font") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };

    let font_dict = match indirect_fonts {
        Some(id) => doc.get_object_mut(id)?.as_dict_mut()?,
        None => {
            let resources = match indirect_resources {
                Some(id) => doc.get_object_mut(id)?.as_dict_mut()?,
                None => doc.get_object_mut(page_id)?.as_dict_mut()?.get_mut(b"Resources")?.as_dict_mut()?,
            };
            if !matches!(resources.get(b"Font"), Ok(Object::Dictionary(_))) {
                resources.set("Font", Dictionary::new());
            }
            resources.get_mut(b"Font")?.as_dict_mut()?
        }
    };

    for (font, id) in fonts {
        font_dict.set(font.resource_name(), Object::Reference(*id));
    }

    Ok(())
}

fn inherited_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = doc.get_dictionary(page_id).ok();

    for _ in 0..MAX_INHERITANCE_DEPTH {
        let Some(node) = current else {
            break;
        };
        let resources = node
            .get(b"Resources")
            .ok()
            .and_then(|obj| doc.dereference(obj).ok())
            .and_then(|(_, obj)| obj.as_dict().ok());
        if let Some(resources) = resources {
            return resources.clone();
        }

        current = node
            .get(b"Parent")
            .ok()
            .and_then(|parent| parent.as_reference().ok())
            .and_then(|parent| doc.get_dictionary(parent).ok());
    }

    Dictionary::new()
}

//! Per-page overlay storage.
//!
//! Overlays are stored in page space. Callers map display pixels to page
//! points once, when a gesture completes, and hand the result to the store.

use crate::{FontFamily, HexColor, PagePoint, PageRect, TextStyle};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Smallest redaction edge, in display pixels, that a draw gesture may produce.
pub const MIN_REDACTION_PX: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OverlayId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    #[error("text annotations must contain visible characters")]
    EmptyText,
    #[error("redaction rectangle is empty or not finite")]
    DegenerateRect,
    #[error("unknown overlay {0:?}")]
    UnknownOverlay(OverlayId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redaction {
    pub id: OverlayId,
    pub page_index: u32,
    pub rect: PageRect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnnotation {
    pub id: OverlayId,
    pub page_index: u32,
    /// Top-left corner of the text box.
    pub anchor: PagePoint,
    pub text: String,
    pub style: TextStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StyleChange {
    pub font: Option<FontFamily>,
    pub size: Option<f32>,
    pub color: Option<HexColor>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageOverlays {
    redactions: BTreeMap<OverlayId, Redaction>,
    texts: Vec<TextAnnotation>,
}

impl PageOverlays {
    pub fn redactions(&self) -> impl Iterator<Item = &Redaction> {
        self.redactions.values()
    }

    pub fn texts(&self) -> &[TextAnnotation] {
        &self.texts
    }

    pub fn is_empty(&self) -> bool {
        self.redactions.is_empty() && self.texts.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct OverlayStore {
    pages: BTreeMap<u32, PageOverlays>,
    index: HashMap<OverlayId, u32>,
    next_id: u64,
}

impl OverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_redaction(&mut self, page_index: u32, rect: PageRect) -> Result<OverlayId, OverlayError> {
        let rect = PageRect::from_corners(
            PagePoint::new(rect.x0, rect.y0),
            PagePoint::new(rect.x1, rect.y1),
        );
        if !rect.is_finite() || rect.width() <= 0.0 || rect.height() <= 0.0 {
            return Err(OverlayError::DegenerateRect);
        }

        let id = self.allocate_id(page_index);
        self.pages.entry(page_index).or_default().redactions.insert(
            id,
            Redaction { id, page_index, rect },
        );

        Ok(id)
    }

    pub fn add_text(
        &mut self,
        page_index: u32,
        anchor: PagePoint,
        text: impl Into<String>,
        style: TextStyle,
    ) -> Result<OverlayId, OverlayError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(OverlayError::EmptyText);
        }

        let id = self.allocate_id(page_index);
        self.pages.entry(page_index).or_default().texts.push(TextAnnotation {
            id,
            page_index,
            anchor,
            text,
            style: style.normalized(),
        });

        Ok(id)
    }

    pub fn page_of(&self, id: OverlayId) -> Option<u32> {
        self.index.get(&id).copied()
    }

    pub fn page(&self, page_index: u32) -> Option<&PageOverlays> {
        self.pages.get(&page_index)
    }

    /// Page indices that carry at least one overlay, ascending.
    pub fn pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.iter().filter(|(_, page)| !page.is_empty()).map(|(index, _)| *index)
    }

    pub fn redactions_on(&self, page_index: u32) -> impl Iterator<Item = &Redaction> {
        self.pages.get(&page_index).into_iter().flat_map(|page| page.redactions())
    }

    pub fn texts_on(&self, page_index: u32) -> &[TextAnnotation] {
        self.pages.get(&page_index).map(|page| page.texts()).unwrap_or(&[])
    }

    pub fn redaction(&self, id: OverlayId) -> Option<&Redaction> {
        let page = self.page_of(id)?;
        self.pages.get(&page)?.redactions.get(&id)
    }

    pub fn text(&self, id: OverlayId) -> Option<&TextAnnotation> {
        let page = self.page_of(id)?;
        self.pages.get(&page)?.texts.iter().find(|text| text.id == id)
    }

    pub fn set_redaction_rect(&mut self, id: OverlayId, rect: PageRect) -> Result<(), OverlayError> {
        let rect = PageRect::from_corners(
            PagePoint::new(rect.x0, rect.y0),
            PagePoint::new(rect.x1, rect.y1),
        );
        if !rect.is_finite() || rect.width() <= 0.0 || rect.height() <= 0.0 {
            return Err(OverlayError::DegenerateRect);
        }

        self.redaction_mut(id)?.rect = rect;
        Ok(())
    }

    pub fn translate_redaction(&mut self, id: OverlayId, dx: f32, dy: f32) -> Result<(), OverlayError> {
        let redaction = self.redaction_mut(id)?;
        redaction.rect = redaction.rect.translated(dx, dy);
        Ok(())
    }

    pub fn move_text(&mut self, id: OverlayId, anchor: PagePoint) -> Result<(), OverlayError> {
        self.text_mut(id)?.anchor = anchor;
        Ok(())
    }

    /// Applies the set fields of `change`; returns whether anything differed.
    pub fn restyle_text(&mut self, id: OverlayId, change: StyleChange) -> Result<bool, OverlayError> {
        let text = self.text_mut(id)?;
        let before = text.style;

        if let Some(font) = change.font {
            text.style.font = font;
        }
        if let Some(size) = change.size {
            text.style.size = size;
        }
        if let Some(color) = change.color {
            text.style.color = color;
        }
        text.style = text.style.normalized();

        Ok(text.style != before)
    }

    pub fn remove_redaction(&mut self, id: OverlayId) -> Option<Redaction> {
        let page = self.page_of(id)?;
        let removed = self.pages.get_mut(&page)?.redactions.remove(&id)?;
        self.index.remove(&id);
        self.drop_if_empty(page);
        Some(removed)
    }

    pub fn remove_text(&mut self, id: OverlayId) -> Option<TextAnnotation> {
        let page = self.page_of(id)?;
        let texts = &mut self.pages.get_mut(&page)?.texts;
        let position = texts.iter().position(|text| text.id == id)?;
        let removed = texts.remove(position);
        self.index.remove(&id);
        self.drop_if_empty(page);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn allocate_id(&mut self, page_index: u32) -> OverlayId {
        self.next_id += 1;
        let id = OverlayId(self.next_id);
        self.index.insert(id, page_index);
        id
    }

    fn drop_if_empty(&mut self, page_index: u32) {
        if self.pages.get(&page_index).is_some_and(PageOverlays::is_empty) {
            self.pages.remove(&page_index);
        }
    }

    fn redaction_mut(&mut self, id: OverlayId) -> Result<&mut Redaction, OverlayError> {
        let page = self.page_of(id).ok_or(OverlayError::UnknownOverlay(id))?;
        self.pages
            .get_mut(&page)
            .and_then(|page| page.redactions.get_mut(&id))
            .ok_or(OverlayError::UnknownOverlay(id))
    }

    fn text_mut(&mut self, id: OverlayId) -> Result<&mut TextAnnotation, OverlayError> {
        let page = self.page_of(id).ok_or(OverlayError::UnknownOverlay(id))?;
        self.pages
            .get_mut(&page)
            .and_then(|page| page.texts.iter_mut().find(|text| text.id == id))
            .ok_or(OverlayError::UnknownOverlay(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> PageRect {
        PageRect { x0, y0, x1, y1 }
    }

    #[test]
    fn redactions_are_normalized_and_indexed_by_page() {
        let mut store = OverlayStore::new();
        let id = store.add_redaction(1, rect(50.0, 80.0, 10.0, 20.0)).expect("valid rect");

        assert_eq!(store.page_of(id), Some(1));
        let stored = store.redaction(id).expect("redaction stored");
        assert_eq!(stored.rect, rect(10.0, 20.0, 50.0, 80.0));
        assert_eq!(store.redactions_on(0).count(), 0);
        assert_eq!(store.redactions_on(1).count(), 1);
    }

    #[test]
    fn degenerate_redactions_are_rejected() {
        let mut store = OverlayStore::new();

        assert_eq!(
            store.add_redaction(0, rect(10.0, 10.0, 10.0, 40.0)),
            Err(OverlayError::DegenerateRect)
        );
        assert_eq!(
            store.add_redaction(0, rect(f32::NAN, 0.0, 5.0, 5.0)),
            Err(OverlayError::DegenerateRect)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn blank_text_is_never_stored() {
        let mut store = OverlayStore::new();

        for blank in ["", "   ", "\t\n"] {
            assert_eq!(
                store.add_text(0, PagePoint::new(1.0, 1.0), blank, TextStyle::default()),
                Err(OverlayError::EmptyText)
            );
        }
        assert!(store.is_empty());
        assert!(store.texts_on(0).is_empty());
    }

    #[test]
    fn texts_keep_insertion_order() {
        let mut store = OverlayStore::new();
        for label in ["first", "second", "third"] {
            store.add_text(2, PagePoint::new(0.0, 0.0), label, TextStyle::default()).unwrap();
        }

        let order: Vec<&str> = store.texts_on(2).iter().map(|text| text.text.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn restyle_reports_changes_and_clamps_size() {
        let mut store = OverlayStore::new();
        let id = store.add_text(0, PagePoint::new(0.0, 0.0), "Hi", TextStyle::default()).unwrap();

        let changed = store
            .restyle_text(id, StyleChange { size: Some(100.0), font: Some(FontFamily::Serif), color: None })
            .unwrap();
        assert!(changed);

        let text = store.text(id).unwrap();
        assert_eq!(text.style.size, crate::MAX_FONT_SIZE);
        assert_eq!(text.style.font, FontFamily::Serif);

        let unchanged = store.restyle_text(id, StyleChange::default()).unwrap();
        assert!(!unchanged);
    }

    #[test]
    fn moves_mutate_in_place() {
        let mut store = OverlayStore::new();
        let redaction = store.add_redaction(0, rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        let text = store.add_text(0, PagePoint::new(5.0, 5.0), "x", TextStyle::default()).unwrap();

        store.translate_redaction(redaction, 3.0, -2.0).unwrap();
        store.move_text(text, PagePoint::new(40.0, 50.0)).unwrap();

        assert_eq!(store.redaction(redaction).unwrap().rect, rect(3.0, -2.0, 13.0, 8.0));
        assert_eq!(store.text(text).unwrap().anchor, PagePoint::new(40.0, 50.0));
    }

    #[test]
    fn removal_clears_index_and_rejects_stale_ids() {
        let mut store = OverlayStore::new();
        let redaction = store.add_redaction(3, rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        let text = store.add_text(3, PagePoint::new(0.0, 0.0), "gone", TextStyle::default()).unwrap();

        assert!(store.remove_redaction(redaction).is_some());
        assert!(store.remove_text(text).is_some());
        assert!(store.remove_redaction(redaction).is_none());
        assert!(store.is_empty());
        assert_eq!(store.pages().count(), 0);
        assert!(store.page(3).is_none());
        assert_eq!(
            store.move_text(text, PagePoint::new(1.0, 1.0)),
            Err(OverlayError::UnknownOverlay(text))
        );
    }

    #[test]
    fn pages_are_released_once_their_last_overlay_goes() {
        let mut store = OverlayStore::new();
        let kept = store.add_redaction(0, rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        let first = store.add_redaction(4, rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        let second = store.add_text(4, PagePoint::new(0.0, 0.0), "note", TextStyle::default()).unwrap();

        store.remove_redaction(first).unwrap();
        assert!(store.page(4).is_some());

        store.remove_text(second).unwrap();
        assert!(store.page(4).is_none());
        assert!(store.page(0).is_some());
        assert_eq!(store.pages().collect::<Vec<_>>(), vec![0]);
        assert!(store.redaction(kept).is_some());
    }

    #[test]
    fn ids_are_kind_checked() {
        let mut store = OverlayStore::new();
        let text = store.add_text(0, PagePoint::new(0.0, 0.0), "t", TextStyle::default()).unwrap();

        assert!(store.remove_redaction(text).is_none());
        assert!(store.text(text).is_some());
    }
}

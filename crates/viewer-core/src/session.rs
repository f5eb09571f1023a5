//! Headless viewer session.
//!
//! Every gesture is a method taking display-pixel coordinates. Overlays are
//! mapped to page space as soon as the gesture completes, using the geometry
//! of the raster that was on screen at that moment.

use crate::cache::LruCache;
use crate::mapper::{CoordinateMapper, DisplayGeometry};
use crate::thumbnails::ThumbnailBatcher;
use crate::view::{CanvasSize, ViewState, ZOOM_STEP};
use doc_model::{
    OverlayError, OverlayId, OverlayStore, PageBox, PagePoint, PageRect, PageSize, PixelPoint,
    PixelRect, Preferences, Redaction, StyleChange, TextAnnotation, TextStyle, MIN_REDACTION_PX,
};
use pdf_engine::{
    export_to_path, DocumentHandle, ExportError, ExportReport, OpenSource, PdfEngine,
    PdfEngineError, RenderRequest, RgbaImage, ThumbnailSize,
};
use std::path::Path;

/// Average glyph advance as a fraction of the font size, used to estimate
/// text extents for hit-testing.
const GLYPH_WIDTH_RATIO: f32 = 0.6;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] PdfEngineError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    #[error("overlay {0:?} is not on the current page")]
    NotOnCurrentPage(OverlayId),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("session is closed")]
    Closed,
}

/// Keyboard resize of a selected redaction, applied in display pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nudge {
    Taller,
    Shorter,
    Wider,
    Narrower,
}

impl Nudge {
    pub const STEP_PX: f32 = 5.0;
}

/// An overlay of the current page projected onto the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenOverlay {
    Redaction { id: OverlayId, rect: PixelRect },
    Text { id: OverlayId, origin: PixelPoint, text: String, style: TextStyle, pixel_size: f32 },
}

pub struct Session<E: PdfEngine> {
    engine: E,
    handle: Option<DocumentHandle>,
    page_boxes: Vec<PageBox>,
    view: ViewState,
    canvas: CanvasSize,
    geometry: Option<DisplayGeometry>,
    raster: Option<RgbaImage>,
    overlays: OverlayStore,
    thumbnails: LruCache<u32, RgbaImage>,
    batcher: ThumbnailBatcher,
    thumbnail_size: ThumbnailSize,
    text_defaults: TextStyle,
}

impl<E: PdfEngine> Session<E> {
    /// Opens `source` and renders the first page into a default-sized canvas.
    pub fn open(
        mut engine: E,
        source: impl Into<OpenSource>,
        preferences: &Preferences,
    ) -> Result<Self, SessionError> {
        let handle = engine.open(source.into())?;
        let page_count = engine.page_count(handle)?;
        let page_boxes = (0..page_count)
            .map(|page| engine.page_box(handle, page))
            .collect::<Result<Vec<_>, _>>()?;

        let mut session = Self {
            engine,
            handle: Some(handle),
            page_boxes,
            view: ViewState::default(),
            canvas: CanvasSize::default(),
            geometry: None,
            raster: None,
            overlays: OverlayStore::new(),
            thumbnails: LruCache::new(preferences.thumbnail_cache_capacity),
            batcher: ThumbnailBatcher::new(page_count, preferences.thumbnail_batch_size),
            thumbnail_size: ThumbnailSize::default(),
            text_defaults: preferences.text_style.normalized(),
        };
        session.display_page()?;

        Ok(session)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn page_count(&self) -> u32 {
        self.page_boxes.len() as u32
    }

    pub fn page_box(&self, page_index: u32) -> Result<PageBox, SessionError> {
        self.page_boxes
            .get(page_index as usize)
            .copied()
            .ok_or(SessionError::PageOutOfRange { page: page_index, page_count: self.page_count() })
    }

    pub fn page_size(&self, page_index: u32) -> Result<PageSize, SessionError> {
        Ok(self.page_box(page_index)?.size)
    }

    pub fn current_page(&self) -> u32 {
        self.view.current_page
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn geometry(&self) -> Option<DisplayGeometry> {
        self.geometry
    }

    pub fn raster(&self) -> Option<&RgbaImage> {
        self.raster.as_ref()
    }

    pub fn overlays(&self) -> &OverlayStore {
        &self.overlays
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// Mapper for the current page and the raster currently on screen.
    pub fn mapper(&self) -> CoordinateMapper {
        let page = self.page_boxes.get(self.view.current_page as usize).copied().unwrap_or_default();
        CoordinateMapper::new(page, self.geometry)
    }

    /// Re-renders the current page for the current view and canvas.
    pub fn display_page(&mut self) -> Result<(), SessionError> {
        let handle = self.handle()?;
        let page_index = self.view.current_page;
        let scale = self.view.render_scale(self.page_size(page_index)?, self.canvas);

        let raster = self.engine.render_page(handle, RenderRequest { page_index, scale })?;
        let geometry =
            DisplayGeometry::new(raster.width(), raster.height(), self.canvas, self.view.fit_to_window());
        log::debug!(
            "displaying page {page_index} at {}x{} (scale {scale:.3}, offset {:?})",
            raster.width(),
            raster.height(),
            geometry.offset()
        );

        self.geometry = Some(geometry);
        self.raster = Some(raster);
        Ok(())
    }

    pub fn resize_canvas(&mut self, width: f32, height: f32) -> Result<(), SessionError> {
        self.canvas = CanvasSize::new(width, height);
        if self.view.fit_to_window() {
            return self.display_page();
        }

        if let Some(geometry) = self.geometry.as_mut() {
            geometry.canvas = self.canvas;
        }
        Ok(())
    }

    /// Returns whether the current page changed.
    pub fn goto_page(&mut self, page_index: u32) -> Result<bool, SessionError> {
        let page_count = self.page_count();
        if page_index >= page_count {
            return Err(SessionError::PageOutOfRange { page: page_index, page_count });
        }
        if !self.view.goto(page_index, page_count) {
            return Ok(false);
        }

        self.display_page()?;
        Ok(true)
    }

    pub fn next_page(&mut self) -> Result<bool, SessionError> {
        let page_count = self.page_count();
        if !self.view.next(page_count) {
            return Ok(false);
        }
        self.display_page()?;
        Ok(true)
    }

    pub fn previous_page(&mut self) -> Result<bool, SessionError> {
        let page_count = self.page_count();
        if !self.view.previous(page_count) {
            return Ok(false);
        }
        self.display_page()?;
        Ok(true)
    }

    pub fn zoom_in(&mut self) -> Result<(), SessionError> {
        self.view.zoom_in(ZOOM_STEP);
        self.display_page()
    }

    pub fn zoom_out(&mut self) -> Result<(), SessionError> {
        self.view.zoom_out(ZOOM_STEP);
        self.display_page()
    }

    pub fn zoom_reset(&mut self) -> Result<(), SessionError> {
        self.view.zoom_reset();
        self.display_page()
    }

    pub fn set_zoom(&mut self, zoom: f32) -> Result<(), SessionError> {
        self.view.set_zoom(zoom);
        self.display_page()
    }

    pub fn set_fit_to_window(&mut self, fit: bool) -> Result<(), SessionError> {
        self.view.set_fit_to_window(fit);
        self.display_page()
    }

    pub fn toggle_fit(&mut self) -> Result<(), SessionError> {
        self.view.toggle_fit();
        self.display_page()
    }

    /// Completes a redaction drag from `from` to `to`. Rectangles smaller than
    /// [`MIN_REDACTION_PX`] on either side, or lying entirely off the page,
    /// are discarded and yield `None`.
    pub fn add_redaction(
        &mut self,
        from: PixelPoint,
        to: PixelPoint,
    ) -> Result<Option<OverlayId>, SessionError> {
        let drawn = PixelRect::from_corners(from, to);
        if drawn.width() < MIN_REDACTION_PX || drawn.height() < MIN_REDACTION_PX {
            log::debug!("discarding {}x{} px redaction", drawn.width(), drawn.height());
            return Ok(None);
        }

        let mapper = self.mapper();
        let Some(rect) = mapper.rect_to_page(drawn).intersection(&mapper.page_box().rect()) else {
            log::debug!("discarding redaction outside the page");
            return Ok(None);
        };

        let id = self.overlays.add_redaction(self.view.current_page, rect)?;
        log::debug!("added redaction {id:?} at {rect:?}");
        Ok(Some(id))
    }

    /// Topmost redaction of the current page under `point`.
    pub fn redaction_at(&self, point: PixelPoint) -> Option<OverlayId> {
        let point = self.mapper().to_page(point);
        self.overlays
            .redactions_on(self.view.current_page)
            .filter(|redaction| redaction.rect.contains(point))
            .last()
            .map(|redaction| redaction.id)
    }

    /// Drags a redaction by a display-pixel delta. The rectangle stays on the page.
    pub fn move_redaction(&mut self, id: OverlayId, dx: f32, dy: f32) -> Result<(), SessionError> {
        let rect = self.current_redaction(id)?.rect;
        let mapper = self.mapper();
        let page = mapper.page_box().rect();
        let (page_dx, page_dy) = mapper.delta_to_page(dx, dy);

        let page_dx = clamp_shift(page_dx, page.x0 - rect.x0, page.x1 - rect.x1);
        let page_dy = clamp_shift(page_dy, page.y0 - rect.y0, page.y1 - rect.y1);
        self.overlays.translate_redaction(id, page_dx, page_dy)?;
        Ok(())
    }

    /// Grows or shrinks a redaction by [`Nudge::STEP_PX`]; it never gets
    /// smaller than [`MIN_REDACTION_PX`] on screen.
    pub fn nudge_redaction(&mut self, id: OverlayId, nudge: Nudge) -> Result<(), SessionError> {
        let rect = self.current_redaction(id)?.rect;
        let mapper = self.mapper();
        let mut pixels = mapper.rect_to_pixel(rect);

        match nudge {
            Nudge::Taller => pixels.y1 += Nudge::STEP_PX,
            Nudge::Shorter => pixels.y1 = (pixels.y1 - Nudge::STEP_PX).max(pixels.y0 + MIN_REDACTION_PX),
            Nudge::Wider => pixels.x1 += Nudge::STEP_PX,
            Nudge::Narrower => pixels.x1 = (pixels.x1 - Nudge::STEP_PX).max(pixels.x0 + MIN_REDACTION_PX),
        }

        let resized = mapper.rect_to_page(pixels).intersection(&mapper.page_box().rect()).unwrap_or(rect);
        self.overlays.set_redaction_rect(id, resized)?;
        Ok(())
    }

    pub fn remove_redaction(&mut self, id: OverlayId) -> Option<Redaction> {
        self.overlays.remove_redaction(id)
    }

    /// Places `text` with the session's default style. Blank text yields `None`.
    pub fn place_text(&mut self, at: PixelPoint, text: &str) -> Result<Option<OverlayId>, SessionError> {
        self.place_text_styled(at, text, self.text_defaults)
    }

    pub fn place_text_styled(
        &mut self,
        at: PixelPoint,
        text: &str,
        style: TextStyle,
    ) -> Result<Option<OverlayId>, SessionError> {
        let anchor = self.mapper().to_page(at);
        match self.overlays.add_text(self.view.current_page, anchor, text, style) {
            Ok(id) => Ok(Some(id)),
            Err(OverlayError::EmptyText) => {
                log::debug!("discarding blank text annotation");
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Topmost text annotation of the current page under `point`, using an
    /// estimated text box.
    pub fn text_at(&self, point: PixelPoint) -> Option<OverlayId> {
        let point = self.mapper().to_page(point);
        self.overlays
            .texts_on(self.view.current_page)
            .iter()
            .rev()
            .find(|text| estimated_bounds(text).contains(point))
            .map(|text| text.id)
    }

    /// Moves a text annotation so its top-left sits at `to`.
    pub fn move_text(&mut self, id: OverlayId, to: PixelPoint) -> Result<(), SessionError> {
        self.current_text(id)?;
        let anchor = self.mapper().to_page(to);
        self.overlays.move_text(id, anchor)?;
        Ok(())
    }

    pub fn restyle_text(&mut self, id: OverlayId, change: StyleChange) -> Result<bool, SessionError> {
        Ok(self.overlays.restyle_text(id, change)?)
    }

    pub fn remove_text(&mut self, id: OverlayId) -> Option<TextAnnotation> {
        self.overlays.remove_text(id)
    }

    pub fn text_defaults(&self) -> TextStyle {
        self.text_defaults
    }

    pub fn set_text_defaults(&mut self, style: TextStyle) {
        self.text_defaults = style.normalized();
    }

    /// Overlays of the current page in canvas coordinates, redactions first.
    pub fn screen_overlays(&self) -> Vec<ScreenOverlay> {
        let mapper = self.mapper();
        let page = self.view.current_page;
        let (_, scale_y) = mapper.scale();

        let redactions = self
            .overlays
            .redactions_on(page)
            .map(|redaction| ScreenOverlay::Redaction { id: redaction.id, rect: mapper.rect_to_pixel(redaction.rect) });
        let texts = self.overlays.texts_on(page).iter().map(|text| ScreenOverlay::Text {
            id: text.id,
            origin: mapper.to_pixel(text.anchor),
            text: text.text.clone(),
            style: text.style,
            pixel_size: text.style.size / scale_y,
        });

        redactions.chain(texts).collect()
    }

    /// Thumbnail of `page_index`, rendered on first use and cached.
    pub fn thumbnail(&mut self, page_index: u32) -> Result<&RgbaImage, SessionError> {
        self.ensure_thumbnail(page_index)?;
        let page_count = self.page_count();
        self.thumbnails.get(&page_index).ok_or(SessionError::PageOutOfRange { page: page_index, page_count })
    }

    pub fn cached_thumbnails(&self) -> usize {
        self.thumbnails.len()
    }

    /// Renders the next batch of thumbnails. Returns whether pages remain.
    /// Pages that fail to render are logged and skipped.
    pub fn pump_thumbnails(&mut self) -> bool {
        if let Some(batch) = self.batcher.next_batch() {
            for page_index in batch {
                if let Err(error) = self.ensure_thumbnail(page_index) {
                    log::warn!("thumbnail for page {page_index} failed: {error}");
                }
            }
        }

        !self.batcher.is_done()
    }

    /// Writes the document with every overlay burned in to `path`. The
    /// session's overlays are left as they are, whether or not export succeeds.
    pub fn export(&self, path: &Path) -> Result<ExportReport, SessionError> {
        let source = self.engine.source_bytes(self.handle()?)?;
        Ok(export_to_path(source, &self.overlays, path)?)
    }

    pub fn close(&mut self) -> Result<(), SessionError> {
        self.raster = None;
        self.geometry = None;
        self.thumbnails.clear();

        if let Some(handle) = self.handle.take() {
            self.engine.close(handle)?;
        }
        Ok(())
    }

    fn handle(&self) -> Result<DocumentHandle, SessionError> {
        self.handle.ok_or(SessionError::Closed)
    }

    fn ensure_thumbnail(&mut self, page_index: u32) -> Result<(), SessionError> {
        self.page_size(page_index)?;
        if self.thumbnails.contains_key(&page_index) {
            return Ok(());
        }

        let image = self.engine.render_thumbnail(self.handle()?, page_index, self.thumbnail_size)?;
        if let Some((evicted, _)) = self.thumbnails.insert(page_index, image) {
            log::debug!("evicted thumbnail for page {evicted}");
        }
        Ok(())
    }

    fn current_redaction(&self, id: OverlayId) -> Result<&Redaction, SessionError> {
        let redaction = self.overlays.redaction(id).ok_or(OverlayError::UnknownOverlay(id))?;
        if redaction.page_index != self.view.current_page {
            return Err(SessionError::NotOnCurrentPage(id));
        }
        Ok(redaction)
    }

    fn current_text(&self, id: OverlayId) -> Result<&TextAnnotation, SessionError> {
        let text = self.overlays.text(id).ok_or(OverlayError::UnknownOverlay(id))?;
        if text.page_index != self.view.current_page {
            return Err(SessionError::NotOnCurrentPage(id));
        }
        Ok(text)
    }
}

impl<E: PdfEngine> Drop for Session<E> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(error) = self.engine.close(handle) {
                log::warn!("failed to close document: {error}");
            }
        }
    }
}

fn clamp_shift(delta: f32, min: f32, max: f32) -> f32 {
    if min > max {
        return 0.0;
    }
    delta.clamp(min, max)
}

fn estimated_bounds(text: &TextAnnotation) -> PageRect {
    let longest = text.text.lines().map(|line| line.chars().count()).max().unwrap_or(0) as f32;
    let lines = text.text.lines().count().max(1) as f32;
    let size = text.style.size;

    PageRect::from_corners(
        text.anchor,
        PagePoint::new(text.anchor.x + longest * size * GLYPH_WIDTH_RATIO, text.anchor.y - lines * size),
    )
}

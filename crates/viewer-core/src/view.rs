use doc_model::PageSize;

pub const BASE_ZOOM: f32 = 1.5;
pub const MIN_ZOOM: f32 = 0.4;
pub const MAX_ZOOM: f32 = 6.0;
pub const ZOOM_STEP: f32 = 0.1;
/// Space kept free around the page in fit-to-window mode.
pub const FIT_MARGIN_PX: f32 = 40.0;
pub const MIN_CANVAS_PX: f32 = 50.0;

/// Size of the area the page raster is drawn into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

impl CanvasSize {
    pub fn new(width: f32, height: f32) -> Self {
        let sanitize = |value: f32| if value.is_finite() { value.max(MIN_CANVAS_PX) } else { MIN_CANVAS_PX };
        Self { width: sanitize(width), height: sanitize(height) }
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self { width: 900.0, height: 700.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub current_page: u32,
    zoom: f32,
    fit_to_window: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self { current_page: 0, zoom: BASE_ZOOM, fit_to_window: true }
    }
}

impl ViewState {
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn fit_to_window(&self) -> bool {
        self.fit_to_window
    }

    /// Any manual zoom leaves fit-to-window mode.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.fit_to_window = false;
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    pub fn zoom_in(&mut self, step: f32) {
        self.set_zoom(self.zoom + step.abs());
    }

    pub fn zoom_out(&mut self, step: f32) {
        self.set_zoom(self.zoom - step.abs());
    }

    pub fn zoom_reset(&mut self) {
        self.set_zoom(1.0);
    }

    pub fn set_fit_to_window(&mut self, fit: bool) {
        self.fit_to_window = fit;
    }

    pub fn toggle_fit(&mut self) {
        self.fit_to_window = !self.fit_to_window;
    }

    /// Moves to `page` if it exists; returns whether the page changed.
    pub fn goto(&mut self, page: u32, page_count: u32) -> bool {
        if page >= page_count || page == self.current_page {
            return false;
        }
        self.current_page = page;
        true
    }

    pub fn next(&mut self, page_count: u32) -> bool {
        self.goto(self.current_page.saturating_add(1), page_count)
    }

    pub fn previous(&mut self, page_count: u32) -> bool {
        match self.current_page.checked_sub(1) {
            Some(page) => self.goto(page, page_count),
            None => false,
        }
    }

    /// Render scale for the current mode. Fit mode shrinks the base-zoom
    /// raster into the canvas minus its margin and never enlarges it.
    pub fn render_scale(&self, page: PageSize, canvas: CanvasSize) -> f32 {
        if !self.fit_to_window {
            return self.zoom;
        }

        let raster_width = page.width_pt * BASE_ZOOM;
        let raster_height = page.height_pt * BASE_ZOOM;
        if raster_width <= 0.0 || raster_height <= 0.0 {
            return BASE_ZOOM;
        }

        let target_width = (canvas.width - FIT_MARGIN_PX).max(1.0);
        let target_height = (canvas.height - FIT_MARGIN_PX).max(1.0);
        let ratio = (target_width / raster_width).min(target_height / raster_height).min(1.0);

        BASE_ZOOM * ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_zoom_is_bounded_and_leaves_fit_mode() {
        let mut view = ViewState::default();
        assert!(view.fit_to_window());

        view.zoom_in(100.0);
        assert!(!view.fit_to_window());
        assert_eq!(view.zoom(), MAX_ZOOM);

        view.zoom_out(100.0);
        assert_eq!(view.zoom(), MIN_ZOOM);

        view.zoom_reset();
        assert_eq!(view.zoom(), 1.0);

        view.toggle_fit();
        assert!(view.fit_to_window());
    }

    #[test]
    fn navigation_stays_in_range() {
        let mut view = ViewState::default();

        assert!(!view.previous(3));
        assert!(view.next(3));
        assert!(view.next(3));
        assert!(!view.next(3));
        assert_eq!(view.current_page, 2);
        assert!(!view.goto(7, 3));
        assert!(view.goto(0, 3));
    }

    #[test]
    fn fit_scale_shrinks_into_canvas_margin() {
        let view = ViewState::default();
        let page = PageSize { width_pt: 612.0, height_pt: 792.0 };

        let scale = view.render_scale(page, CanvasSize::new(540.0, 700.0));
        assert!((page.width_pt * scale - 500.0).abs() < 1e-3);
        assert!(page.height_pt * scale <= 660.0);
    }

    #[test]
    fn fit_scale_never_enlarges_past_base_zoom() {
        let view = ViewState::default();
        let page = PageSize { width_pt: 100.0, height_pt: 100.0 };

        assert_eq!(view.render_scale(page, CanvasSize::new(4000.0, 4000.0)), BASE_ZOOM);
    }

    #[test]
    fn manual_scale_is_the_zoom_factor() {
        let mut view = ViewState::default();
        view.set_zoom(2.0);

        assert_eq!(view.render_scale(PageSize::default(), CanvasSize::default()), 2.0);
    }

    #[test]
    fn canvas_is_never_smaller_than_minimum() {
        let canvas = CanvasSize::new(10.0, f32::NAN);
        assert_eq!(canvas, CanvasSize { width: MIN_CANVAS_PX, height: MIN_CANVAS_PX });
    }
}

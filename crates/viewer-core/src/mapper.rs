//! Conversion between display pixels and page points.
//!
//! Display space has its origin at the top-left of the canvas and y grows
//! downward. Page space is the page's own user space: y grows upward and the
//! visible box's lower-left corner sits at the box origin, which may be
//! anywhere. In fit-to-window mode the raster is centered in the canvas;
//! with manual zoom the raster origin is the canvas origin.

use crate::view::CanvasSize;
use doc_model::{PageBox, PagePoint, PageRect, PageSize, PixelPoint, PixelRect};

/// Where and how large the current raster is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    pub display_width: f32,
    pub display_height: f32,
    pub canvas: CanvasSize,
    pub fit_to_window: bool,
}

impl DisplayGeometry {
    pub fn new(display_width: u32, display_height: u32, canvas: CanvasSize, fit_to_window: bool) -> Self {
        Self {
            display_width: display_width.max(1) as f32,
            display_height: display_height.max(1) as f32,
            canvas,
            fit_to_window,
        }
    }

    /// Canvas position of the raster's top-left corner.
    pub fn offset(&self) -> (f32, f32) {
        if self.fit_to_window {
            (
                (self.canvas.width - self.display_width) / 2.0,
                (self.canvas.height - self.display_height) / 2.0,
            )
        } else {
            (0.0, 0.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    page: PageBox,
    geometry: Option<DisplayGeometry>,
}

impl CoordinateMapper {
    /// Without a geometry (nothing rendered yet) the mapper falls back to a
    /// 1:1 scale with only the y axis flipped.
    pub fn new(page: impl Into<PageBox>, geometry: Option<DisplayGeometry>) -> Self {
        Self { page: page.into(), geometry }
    }

    pub fn page_box(&self) -> PageBox {
        self.page
    }

    pub fn page_size(&self) -> PageSize {
        self.page.size
    }

    pub fn geometry(&self) -> Option<DisplayGeometry> {
        self.geometry
    }

    /// Page points per display pixel on each axis.
    pub fn scale(&self) -> (f32, f32) {
        match self.geometry {
            Some(geometry) => (
                self.page.size.width_pt / geometry.display_width,
                self.page.size.height_pt / geometry.display_height,
            ),
            None => (1.0, 1.0),
        }
    }

    pub fn to_page(&self, point: PixelPoint) -> PagePoint {
        let top = self.page.origin.y + self.page.size.height_pt;
        let Some(geometry) = self.geometry else {
            return PagePoint::new(self.page.origin.x + point.x, top - point.y);
        };

        let (offset_x, offset_y) = geometry.offset();
        let mut local_x = point.x - offset_x;
        let mut local_y = point.y - offset_y;
        if geometry.fit_to_window {
            local_x = local_x.clamp(0.0, geometry.display_width);
            local_y = local_y.clamp(0.0, geometry.display_height);
        }

        let (scale_x, scale_y) = self.scale();
        PagePoint::new(self.page.origin.x + local_x * scale_x, top - local_y * scale_y)
    }

    pub fn to_pixel(&self, point: PagePoint) -> PixelPoint {
        let (scale_x, scale_y) = self.scale();
        let (offset_x, offset_y) = self.geometry.map(|geometry| geometry.offset()).unwrap_or((0.0, 0.0));

        let top = self.page.origin.y + self.page.size.height_pt;

        PixelPoint::new(
            (point.x - self.page.origin.x) / scale_x + offset_x,
            (top - point.y) / scale_y + offset_y,
        )
    }

    /// Corner order of the input does not matter.
    pub fn rect_to_page(&self, rect: PixelRect) -> PageRect {
        PageRect::from_corners(
            self.to_page(PixelPoint::new(rect.x0, rect.y0)),
            self.to_page(PixelPoint::new(rect.x1, rect.y1)),
        )
    }

    pub fn rect_to_pixel(&self, rect: PageRect) -> PixelRect {
        PixelRect::from_corners(
            self.to_pixel(PagePoint::new(rect.x0, rect.y0)),
            self.to_pixel(PagePoint::new(rect.x1, rect.y1)),
        )
    }

    /// Converts a pointer movement into a page-space displacement.
    pub fn delta_to_page(&self, dx: f32, dy: f32) -> (f32, f32) {
        let (scale_x, scale_y) = self.scale();
        (dx * scale_x, -dy * scale_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

    fn centered() -> CoordinateMapper {
        CoordinateMapper::new(LETTER, Some(DisplayGeometry::new(500, 650, CanvasSize::new(540.0, 700.0), true)))
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < 1e-2, "expected {expected}, got {actual}");
    }

    #[test]
    fn fit_mode_subtracts_centering_offset() {
        let mapper = centered();
        assert_eq!(mapper.geometry().unwrap().offset(), (20.0, 25.0));

        let origin = mapper.to_page(PixelPoint::new(20.0, 25.0));
        assert_close(origin.x, 0.0);
        assert_close(origin.y, 792.0);

        let far = mapper.to_page(PixelPoint::new(520.0, 675.0));
        assert_close(far.x, 612.0);
        assert_close(far.y, 0.0);
    }

    #[test]
    fn fit_mode_clamps_points_outside_the_raster() {
        let mapper = centered();

        let outside = mapper.to_page(PixelPoint::new(-100.0, 10_000.0));
        assert_close(outside.x, 0.0);
        assert_close(outside.y, 0.0);
    }

    #[test]
    fn manual_zoom_has_no_offset_or_clamp() {
        let mapper =
            CoordinateMapper::new(LETTER, Some(DisplayGeometry::new(1224, 1584, CanvasSize::new(800.0, 600.0), false)));

        let point = mapper.to_page(PixelPoint::new(100.0, 200.0));
        assert_close(point.x, 50.0);
        assert_close(point.y, 692.0);

        let beyond = mapper.to_page(PixelPoint::new(2000.0, 0.0));
        assert_close(beyond.x, 1000.0);
    }

    #[test]
    fn missing_raster_falls_back_to_identity_scale() {
        let mapper = CoordinateMapper::new(LETTER, None);

        assert_eq!(mapper.to_page(PixelPoint::new(30.0, 40.0)), PagePoint::new(30.0, 752.0));
        assert_eq!(mapper.to_pixel(PagePoint::new(30.0, 752.0)), PixelPoint::new(30.0, 40.0));
    }

    #[test]
    fn offset_boxes_map_into_their_own_user_space() {
        let page = PageBox::new(PagePoint::new(100.0, 100.0), LETTER);
        let mapper =
            CoordinateMapper::new(page, Some(DisplayGeometry::new(500, 650, CanvasSize::new(540.0, 700.0), true)));

        let top_left = mapper.to_page(PixelPoint::new(20.0, 25.0));
        assert_close(top_left.x, 100.0);
        assert_close(top_left.y, 892.0);

        let whole = mapper.rect_to_page(PixelRect { x0: 0.0, y0: 0.0, x1: 540.0, y1: 700.0 });
        assert_close(whole.x0, 100.0);
        assert_close(whole.y0, 100.0);
        assert_close(whole.x1, 712.0);
        assert_close(whole.y1, 892.0);

        let back = mapper.to_pixel(PagePoint::new(100.0, 100.0));
        assert_close(back.x, 20.0);
        assert_close(back.y, 675.0);
    }

    #[test]
    fn rect_mapping_normalizes_corners() {
        let mapper = centered();
        let forward = mapper.rect_to_page(PixelRect { x0: 100.0, y0: 100.0, x1: 200.0, y1: 150.0 });
        let reversed = mapper.rect_to_page(PixelRect { x0: 200.0, y0: 150.0, x1: 100.0, y1: 100.0 });

        assert_eq!(forward, reversed);
        assert!(forward.x0 < forward.x1);
        assert!(forward.y0 < forward.y1);
    }

    #[test]
    fn pixels_inside_raster_round_trip() {
        let geometries = [
            DisplayGeometry::new(500, 650, CanvasSize::new(540.0, 700.0), true),
            DisplayGeometry::new(347, 449, CanvasSize::new(900.0, 489.0), true),
            DisplayGeometry::new(918, 1188, CanvasSize::new(700.0, 500.0), false),
        ];

        for geometry in geometries {
            let mapper = CoordinateMapper::new(LETTER, Some(geometry));
            let (offset_x, offset_y) = geometry.offset();

            for step_x in 0..=10 {
                for step_y in 0..=10 {
                    let pixel = PixelPoint::new(
                        offset_x + geometry.display_width * step_x as f32 / 10.0,
                        offset_y + geometry.display_height * step_y as f32 / 10.0,
                    );
                    let back = mapper.to_pixel(mapper.to_page(pixel));

                    assert_close(back.x, pixel.x);
                    assert_close(back.y, pixel.y);
                }
            }
        }
    }

    #[test]
    fn deltas_flip_the_vertical_axis() {
        let mapper = centered();
        let (dx, dy) = mapper.delta_to_page(10.0, 10.0);

        assert_close(dx, 12.24);
        assert!(dy < 0.0);
    }
}

mod overlay;
mod style;

pub use overlay::{
    OverlayError, OverlayId, OverlayStore, PageOverlays, Redaction, StyleChange, TextAnnotation,
    MIN_REDACTION_PX,
};
pub use style::{
    ColorParseError, FontFamily, HexColor, TextStyle, DEFAULT_FONT_SIZE, MAX_FONT_SIZE,
    MIN_FONT_SIZE,
};

use serde::{Deserialize, Serialize};

/// Intrinsic page size in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl Default for PageSize {
    fn default() -> Self {
        Self { width_pt: 612.0, height_pt: 792.0 }
    }
}

/// The visible area of a page in its own user space. The lower-left corner is
/// wherever the page's `/CropBox` (or `/MediaBox`) puts it, not necessarily
/// `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageBox {
    pub origin: PagePoint,
    pub size: PageSize,
}

impl PageBox {
    pub fn new(origin: PagePoint, size: PageSize) -> Self {
        Self { origin, size }
    }

    /// `None` unless `rect` is finite with a positive area.
    pub fn from_rect(rect: PageRect) -> Option<Self> {
        let rect = PageRect::from_corners(PagePoint::new(rect.x0, rect.y0), PagePoint::new(rect.x1, rect.y1));
        if !rect.is_finite() || rect.width() <= 0.0 || rect.height() <= 0.0 {
            return None;
        }
        Some(Self::new(
            PagePoint::new(rect.x0, rect.y0),
            PageSize { width_pt: rect.width(), height_pt: rect.height() },
        ))
    }

    pub fn rect(&self) -> PageRect {
        PageRect {
            x0: self.origin.x,
            y0: self.origin.y,
            x1: self.origin.x + self.size.width_pt,
            y1: self.origin.y + self.size.height_pt,
        }
    }
}

impl From<PageSize> for PageBox {
    fn from(size: PageSize) -> Self {
        Self { origin: PagePoint::default(), size }
    }
}

/// A position on the rendered raster, origin top-left, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

impl PixelPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A position in page space, origin bottom-left, y grows upward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PixelRect {
    /// Builds a rect from two arbitrary corners; the result always has `x0 <= x1` and `y0 <= y1`.
    pub fn from_corners(a: PixelPoint, b: PixelPoint) -> Self {
        Self { x0: a.x.min(b.x), y0: a.y.min(b.y), x1: a.x.max(b.x), y1: a.y.max(b.y) }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).abs()
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).abs()
    }

    pub fn contains(&self, point: PixelPoint) -> bool {
        point.x >= self.x0 && point.x <= self.x1 && point.y >= self.y0 && point.y <= self.y1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageRect {
    pub fn from_corners(a: PagePoint, b: PagePoint) -> Self {
        Self { x0: a.x.min(b.x), y0: a.y.min(b.y), x1: a.x.max(b.x), y1: a.y.max(b.y) }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).abs()
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).abs()
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self { x0: self.x0 + dx, y0: self.y0 + dy, x1: self.x1 + dx, y1: self.y1 + dy }
    }

    pub fn contains(&self, point: PagePoint) -> bool {
        point.x >= self.x0 && point.x <= self.x1 && point.y >= self.y0 && point.y <= self.y1
    }

    /// Overlap of two normalized rects; `None` when they share no area.
    pub fn intersection(&self, other: &PageRect) -> Option<PageRect> {
        let overlap = PageRect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        (overlap.x1 > overlap.x0 && overlap.y1 > overlap.y0).then_some(overlap)
    }

    fn is_finite(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1].iter().all(|value| value.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub text_style: TextStyle,
    pub thumbnail_cache_capacity: usize,
    pub thumbnail_batch_size: usize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            text_style: TextStyle::default(),
            thumbnail_cache_capacity: 200,
            thumbnail_batch_size: 8,
        }
    }
}

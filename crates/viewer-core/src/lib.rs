//! View state, coordinate mapping and the headless viewer session.

mod cache;
pub mod mapper;
pub mod session;
mod thumbnails;
mod view;

pub use cache::LruCache;
pub use mapper::{CoordinateMapper, DisplayGeometry};
pub use session::{Nudge, ScreenOverlay, Session, SessionError};
pub use thumbnails::ThumbnailBatcher;
pub use view::{
    CanvasSize, ViewState, BASE_ZOOM, FIT_MARGIN_PX, MAX_ZOOM, MIN_CANVAS_PX, MIN_ZOOM, ZOOM_STEP,
};

//! Overlay scripts: recorded viewer gestures replayed through a [`Session`].
//!
//! ```json
//! {
//!   "canvas": { "width": 540, "height": 700 },
//!   "actions": [
//!     { "action": "goto", "page": 2 },
//!     { "action": "redact", "from": [100, 100], "to": [200, 150] },
//!     { "action": "text", "at": [50, 50], "text": "Hello", "font": "Serif", "size": 14 }
//!   ]
//! }
//! ```
//!
//! Coordinates are canvas pixels for the view state reached by the preceding
//! actions. Pages are 1-based.

use anyhow::{bail, Context, Result};
use doc_model::{FontFamily, HexColor, OverlayId, PixelPoint, StyleChange};
use pdf_engine::PdfEngine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use viewer_core::{Nudge, Session};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlayScript {
    #[serde(default)]
    pub canvas: Option<ScriptCanvas>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScriptCanvas {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl From<Direction> for Nudge {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => Nudge::Taller,
            Direction::Down => Nudge::Shorter,
            Direction::Right => Nudge::Wider,
            Direction::Left => Nudge::Narrower,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    Goto {
        page: u32,
    },
    Next,
    Prev,
    Fit,
    Zoom {
        factor: f32,
    },
    ZoomIn,
    ZoomOut,
    ZoomReset,
    Resize {
        width: f32,
        height: f32,
    },
    Redact {
        from: [f32; 2],
        to: [f32; 2],
    },
    Text {
        at: [f32; 2],
        text: String,
        #[serde(default)]
        font: Option<FontFamily>,
        #[serde(default)]
        size: Option<f32>,
        #[serde(default)]
        color: Option<HexColor>,
    },
    /// Drags the topmost redaction (or else text) under `from` to `to`.
    Drag {
        from: [f32; 2],
        to: [f32; 2],
    },
    Nudge {
        at: [f32; 2],
        direction: Direction,
    },
    Delete {
        at: [f32; 2],
    },
}

/// What a replay did, beyond the overlays themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub actions: usize,
    pub discarded: usize,
}

pub fn load(path: &Path) -> Result<OverlayScript> {
    let bytes = fs::read(path).with_context(|| format!("failed to read overlay script {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("invalid overlay script {}", path.display()))
}

pub fn replay<E: PdfEngine>(session: &mut Session<E>, script: &OverlayScript) -> Result<ReplaySummary> {
    if let Some(canvas) = script.canvas {
        session.resize_canvas(canvas.width, canvas.height)?;
    }

    let mut summary = ReplaySummary::default();
    for (index, action) in script.actions.iter().enumerate() {
        let applied =
            apply(session, action).with_context(|| format!("action {} ({action:?}) failed", index + 1))?;
        summary.actions += 1;
        if !applied {
            log::info!("action {} discarded: {action:?}", index + 1);
            summary.discarded += 1;
        }
    }

    Ok(summary)
}

/// Returns `false` when the gesture was valid but had no effect.
fn apply<E: PdfEngine>(session: &mut Session<E>, action: &Action) -> Result<bool> {
    match action {
        Action::Goto { page } => {
            if *page == 0 {
                bail!("pages are 1-based");
            }
            session.goto_page(page - 1)?;
        }
        Action::Next => return Ok(session.next_page()?),
        Action::Prev => return Ok(session.previous_page()?),
        Action::Fit => session.set_fit_to_window(true)?,
        Action::Zoom { factor } => session.set_zoom(*factor)?,
        Action::ZoomIn => session.zoom_in()?,
        Action::ZoomOut => session.zoom_out()?,
        Action::ZoomReset => session.zoom_reset()?,
        Action::Resize { width, height } => session.resize_canvas(*width, *height)?,
        Action::Redact { from, to } => {
            return Ok(session.add_redaction(point(*from), point(*to))?.is_some());
        }
        Action::Text { at, text, font, size, color } => {
            let Some(id) = session.place_text(point(*at), text)? else {
                return Ok(false);
            };
            let change = StyleChange { font: *font, size: *size, color: *color };
            session.restyle_text(id, change)?;
        }
        Action::Drag { from, to } => {
            let Some(target) = hit(session, point(*from)) else {
                return Ok(false);
            };
            match target {
                Hit::Redaction(id) => session.move_redaction(id, to[0] - from[0], to[1] - from[1])?,
                Hit::Text(id) => {
                    let anchor = session
                        .overlays()
                        .text(id)
                        .map(|text| session.mapper().to_pixel(text.anchor))
                        .context("text vanished during drag")?;
                    let moved = PixelPoint::new(anchor.x + to[0] - from[0], anchor.y + to[1] - from[1]);
                    session.move_text(id, moved)?;
                }
            }
        }
        Action::Nudge { at, direction } => {
            let Some(id) = session.redaction_at(point(*at)) else {
                return Ok(false);
            };
            session.nudge_redaction(id, Nudge::from(*direction))?;
        }
        Action::Delete { at } => {
            return Ok(match hit(session, point(*at)) {
                Some(Hit::Redaction(id)) => session.remove_redaction(id).is_some(),
                Some(Hit::Text(id)) => session.remove_text(id).is_some(),
                None => false,
            });
        }
    }

    Ok(true)
}

enum Hit {
    Redaction(OverlayId),
    Text(OverlayId),
}

fn hit<E: PdfEngine>(session: &Session<E>, at: PixelPoint) -> Option<Hit> {
    session.redaction_at(at).map(Hit::Redaction).or_else(|| session.text_at(at).map(Hit::Text))
}

fn point([x, y]: [f32; 2]) -> PixelPoint {
    PixelPoint::new(x, y)
}

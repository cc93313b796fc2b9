// ============================================================================
// PAINT SESSION: overlay stroke engine with freehand and rectangle tools
// ============================================================================

use image::Rgba;

use crate::canvas::{OverlayRaster, OverlaySnapshot};
use crate::config::EditorConfig;
use crate::error::{EditorError, Result};
use crate::raster::RasterImage;
use crate::log_info;

/// Raster-space point (already mapped from display space).
pub type Point = (f32, f32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    /// Continuous round-capped path following the pointer.
    #[default]
    Freehand,
    /// Single rectangle outline from the press point to the pointer.
    Rect,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Freehand => "freehand",
            Tool::Rect => "rect",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "freehand" | "brush" | "pen" => Some(Tool::Freehand),
            "rect" | "rectangle" | "box" => Some(Tool::Rect),
            _ => None,
        }
    }
}

/// What a single pointer move rendered onto the overlay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rendered {
    /// One round-capped line segment.
    Segment { from: Point, to: Point },
    /// The live rectangle preview after restoring the pre-stroke snapshot.
    Rect { anchor: Point, corner: Point },
}

/// The stroke in progress. The tool and width are locked at pointer-down.
#[derive(Clone, Debug)]
enum ActiveStroke {
    Freehand {
        last: Point,
        line_width: f32,
        /// Pixels already tinted by this stroke.
        covered: CoverageMask,
    },
    Rect {
        anchor: Point,
        line_width: f32,
        /// Overlay content before this stroke; dropped when the stroke ends.
        snapshot: OverlaySnapshot,
    },
}

/// Editing state for one opened image.
///
/// Owns the overlay raster and the in-progress stroke. The base image is
/// shared and only read. Dropping the session discards the overlay.
pub struct PaintSession {
    base: RasterImage,
    overlay: OverlayRaster,
    tool: Tool,
    brush_size: f32,
    color: Rgba<u8>,
    reference_unit_width: f32,
    stroke: Option<ActiveStroke>,
}

impl PaintSession {
    /// Start a session over `base`; the overlay is allocated at its native size.
    pub fn new(base: RasterImage, config: &EditorConfig) -> Result<Self> {
        let (w, h) = base.dimensions();
        if w == 0 || h == 0 {
            return Err(EditorError::ContextUnavailable(format!(
                "cannot allocate a {}x{} overlay",
                w, h
            )));
        }
        if !(config.reference_unit_width > 0.0) {
            return Err(EditorError::ContextUnavailable(
                "brush reference unit width must be positive".into(),
            ));
        }
        Ok(Self {
            base,
            overlay: OverlayRaster::new(w, h),
            tool: Tool::default(),
            brush_size: config.clamp_brush_size(config.default_brush_size),
            color: config.stroke_color,
            reference_unit_width: config.reference_unit_width,
            stroke: None,
        })
    }

    pub fn base(&self) -> &RasterImage {
        &self.base
    }

    pub fn overlay(&self) -> &OverlayRaster {
        &self.overlay
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Takes effect at the next pointer-down; an active stroke keeps its tool.
    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn brush_size(&self) -> f32 {
        self.brush_size
    }

    /// Set the resolution-independent brush size (caller clamps).
    pub fn set_brush_size(&mut self, size: f32) {
        self.brush_size = size;
    }

    pub fn is_drawing(&self) -> bool {
        self.stroke.is_some()
    }

    /// Stroke width in raster pixels for the current brush size.
    pub fn line_width(&self) -> f32 {
        effective_line_width(self.brush_size, self.base.width(), self.reference_unit_width)
    }

    // ---- pointer events -----------------------------------------------------

    /// IDLE → DRAWING. Returns `false` (and does nothing) if a stroke is
    /// already active.
    pub fn pointer_down(&mut self, at: Point) -> bool {
        if self.stroke.is_some() {
            return false;
        }
        let line_width = self.line_width();
        self.stroke = Some(match self.tool {
            Tool::Freehand => ActiveStroke::Freehand {
                last: at,
                line_width,
                covered: CoverageMask::new(self.overlay.width(), self.overlay.height()),
            },
            Tool::Rect => ActiveStroke::Rect {
                anchor: at,
                line_width,
                snapshot: self.overlay.snapshot(),
            },
        });
        true
    }

    /// Render the next piece of the active stroke. Ignored while idle.
    pub fn pointer_move(&mut self, to: Point) -> Option<Rendered> {
        let color = self.color;
        match self.stroke.as_mut()? {
            ActiveStroke::Freehand {
                last,
                line_width,
                covered,
            } => {
                let from = *last;
                let overlay = &mut self.overlay;
                segment_spans(from, to, *line_width, overlay.width(), overlay.height(), |y, x0, x1| {
                    for (r0, r1) in covered.claim(y, x0, x1) {
                        overlay.blend_span(y, r0, r1, color);
                    }
                });
                *last = to;
                Some(Rendered::Segment { from, to })
            }
            ActiveStroke::Rect {
                anchor,
                line_width,
                snapshot,
            } => {
                self.overlay.restore(snapshot);
                stroke_rect(&mut self.overlay, *anchor, to, *line_width, color);
                Some(Rendered::Rect {
                    anchor: *anchor,
                    corner: to,
                })
            }
        }
    }

    /// DRAWING → IDLE. Whatever is on the overlay stays; the snapshot is dropped.
    pub fn pointer_up(&mut self) {
        if let Some(stroke) = self.stroke.take() {
            let kind = match stroke {
                ActiveStroke::Freehand { .. } => Tool::Freehand,
                ActiveStroke::Rect { .. } => Tool::Rect,
            };
            log_info!(
                "stroke ended ({}), {} overlay chunks populated",
                kind.label(),
                self.overlay.chunk_count()
            );
        }
    }

    /// Leaving the surface ends the stroke exactly like releasing the pointer.
    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    /// Wipe every stroke drawn so far. Ends any active stroke.
    pub fn clear_overlay(&mut self) {
        self.stroke = None;
        self.overlay.clear();
    }
}

/// `brush_size × (native_width / reference_unit_width)`.
pub fn effective_line_width(brush_size: f32, native_width: u32, reference_unit_width: f32) -> f32 {
    brush_size * (native_width as f32 / reference_unit_width)
}

// ============================================================================
// RASTER PRIMITIVES
// ============================================================================
//
// Coverage is binary and sampled at pixel centres. Each primitive touches a
// pixel at most once, so one translucent segment never darkens itself. A
// freehand stroke shares one `CoverageMask` across its segments, so the
// joints between them are tinted once as well.

/// One bit per overlay pixel, set once the current stroke has tinted it.
#[derive(Clone, Debug)]
struct CoverageMask {
    width: u32,
    bits: Vec<u64>,
}

impl CoverageMask {
    fn new(width: u32, height: u32) -> Self {
        let len = (width as usize * height as usize).div_ceil(64);
        Self {
            width,
            bits: vec![0; len],
        }
    }

    /// Mark `x0..x1` on row `y` and return the sub-runs that were not yet set.
    fn claim(&mut self, y: u32, x0: u32, x1: u32) -> Vec<(u32, u32)> {
        let mut runs = Vec::new();
        let mut run_start = None;
        for x in x0..x1 {
            let i = y as usize * self.width as usize + x as usize;
            let (word, bit) = (i / 64, 1u64 << (i % 64));
            let fresh = self.bits[word] & bit == 0;
            self.bits[word] |= bit;
            match (fresh, run_start) {
                (true, None) => run_start = Some(x),
                (false, Some(start)) => {
                    runs.push((start, x));
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            runs.push((start, x1));
        }
        runs
    }
}

/// Half-open pixel range whose centres fall inside `[lo, hi]`, clipped to `0..limit`.
fn covered_range(lo: f32, hi: f32, limit: u32) -> Option<(u32, u32)> {
    if !(lo <= hi) {
        return None;
    }
    let start = (lo - 0.5).ceil().max(0.0);
    let end = ((hi - 0.5).floor() + 1.0).min(limit as f32);
    if start >= end {
        return None;
    }
    Some((start as u32, end as u32))
}

fn dist_sq_to_segment(px: f32, py: f32, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((px - a.0) * dx + (py - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (qx, qy) = (a.0 + dx * t, a.1 + dy * t);
    (px - qx) * (px - qx) + (py - qy) * (py - qy)
}

/// Stroke a straight segment with round caps (a capsule of diameter `line_width`).
pub fn stroke_segment(overlay: &mut OverlayRaster, from: Point, to: Point, line_width: f32, color: Rgba<u8>) {
    let (w, h) = (overlay.width(), overlay.height());
    segment_spans(from, to, line_width, w, h, |y, x0, x1| {
        overlay.blend_span(y, x0, x1, color)
    });
}

/// Visit the covered run `(y, x0, x1)` of each row of a capsule, clipped to `width × height`.
fn segment_spans(
    from: Point,
    to: Point,
    line_width: f32,
    width: u32,
    height: u32,
    mut span: impl FnMut(u32, u32, u32),
) {
    let radius = line_width / 2.0;
    if !(radius > 0.0) {
        return;
    }
    let radius_sq = radius * radius;
    let Some((y0, y1)) = covered_range(
        from.1.min(to.1) - radius,
        from.1.max(to.1) + radius,
        height,
    ) else {
        return;
    };
    let Some((x0, x1)) = covered_range(
        from.0.min(to.0) - radius,
        from.0.max(to.0) + radius,
        width,
    ) else {
        return;
    };

    for y in y0..y1 {
        let py = y as f32 + 0.5;
        // A capsule is convex, so each row's coverage is one contiguous run.
        let inside = |x: u32| dist_sq_to_segment(x as f32 + 0.5, py, from, to) <= radius_sq;
        let Some(first) = (x0..x1).find(|&x| inside(x)) else {
            continue;
        };
        let last = (first..x1).rev().find(|&x| inside(x)).unwrap_or(first);
        span(y, first, last + 1);
    }
}

/// Stroke a rectangle outline with mitred corners, centred on the edges
/// of the box spanned by `a` and `b`.
pub fn stroke_rect(overlay: &mut OverlayRaster, a: Point, b: Point, line_width: f32, color: Rgba<u8>) {
    let half = line_width / 2.0;
    if !(half > 0.0) {
        return;
    }
    let (left, right) = (a.0.min(b.0), a.0.max(b.0));
    let (top, bottom) = (a.1.min(b.1), a.1.max(b.1));

    let (w, h) = (overlay.width(), overlay.height());
    let Some((y0, y1)) = covered_range(top - half, bottom + half, h) else {
        return;
    };
    let Some((x0, x1)) = covered_range(left - half, right + half, w) else {
        return;
    };

    // Pixels strictly inside the inner box stay untouched.
    let inner_x = (left + half, right - half);
    let inner_y = (top + half, bottom - half);
    let hollow_cols = if inner_x.0 < inner_x.1 {
        let start = ((inner_x.0 - 0.5).floor() + 1.0).max(x0 as f32);
        let end = (inner_x.1 - 0.5).ceil().min(x1 as f32);
        (start < end).then(|| (start as u32, end as u32))
    } else {
        None
    };

    for y in y0..y1 {
        let py = y as f32 + 0.5;
        let in_hollow_row = py > inner_y.0 && py < inner_y.1;
        match hollow_cols {
            Some((hx0, hx1)) if in_hollow_row => {
                overlay.blend_span(y, x0, hx0, color);
                overlay.blend_span(y, hx1, x1, color);
            }
            _ => overlay.blend_span(y, x0, x1, color),
        }
    }
}

use std::sync::Arc;

use image::{Rgba, RgbaImage};

// ============================================================================
// OVERLAY RASTER – sparse 64×64 chunk storage with copy-on-write snapshots
// ============================================================================

pub const CHUNK_SIZE: u32 = 64;

/// A pixel with zero alpha, returned by reference for missing chunks.
static TRANSPARENT_PIXEL: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Transparent paint layer sized to the base image's native resolution.
///
/// Backed by a flat `Vec<Option<Arc<RgbaImage>>>` indexed by
/// `cy * chunks_per_row + cx`. Untouched chunks stay `None`, so a fresh
/// overlay over a 4K image costs almost nothing.
///
/// Chunks are `Arc`-wrapped: [`OverlayRaster::snapshot`] only bumps reference
/// counts, and writes go through `Arc::make_mut`, which clones just the
/// touched chunk. The rectangle tool leans on this to restore its pre-stroke
/// state on every pointer move.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayRaster {
    width: u32,
    height: u32,
    chunks_per_row: u32,
    chunks: Vec<Option<Arc<RgbaImage>>>,
}

/// Full copy of an overlay's pixel content at one moment.
#[derive(Clone, Debug)]
pub struct OverlaySnapshot {
    pixels: OverlayRaster,
}

impl OverlayRaster {
    // ---- construction -------------------------------------------------------

    /// Create a fully transparent overlay. Both dimensions must be non-zero.
    pub fn new(width: u32, height: u32) -> Self {
        debug_assert!(width > 0 && height > 0);
        let chunks_per_row = width.div_ceil(CHUNK_SIZE);
        let chunks_per_col = height.div_ceil(CHUNK_SIZE);
        Self {
            width,
            height,
            chunks_per_row,
            chunks: vec![None; (chunks_per_row * chunks_per_col) as usize],
        }
    }

    /// Import from a flat `RgbaImage`. Only chunks with visible pixels are stored.
    pub fn from_rgba_image(src: &RgbaImage) -> Self {
        let mut img = Self::new(src.width(), src.height());
        for (x, y, px) in src.enumerate_pixels() {
            if px[3] != 0 {
                img.put_pixel(x, y, *px);
            }
        }
        img
    }

    /// Flatten into a plain `RgbaImage` (missing chunks become transparent).
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.width, self.height);
        for (idx, slot) in self.chunks.iter().enumerate() {
            let Some(chunk) = slot else { continue };
            let cx = idx as u32 % self.chunks_per_row;
            let cy = idx as u32 / self.chunks_per_row;
            let base_x = cx * CHUNK_SIZE;
            let base_y = cy * CHUNK_SIZE;
            let cw = CHUNK_SIZE.min(self.width - base_x);
            let ch = CHUNK_SIZE.min(self.height - base_y);
            for ly in 0..ch {
                for lx in 0..cw {
                    out.put_pixel(base_x + lx, base_y + ly, *chunk.get_pixel(lx, ly));
                }
            }
        }
        out
    }

    // ---- indexing helpers ----------------------------------------------------

    #[inline(always)]
    fn flat_index(&self, cx: u32, cy: u32) -> usize {
        (cy * self.chunks_per_row + cx) as usize
    }

    #[inline(always)]
    fn chunk_coord(x: u32, y: u32) -> (u32, u32) {
        (x / CHUNK_SIZE, y / CHUNK_SIZE)
    }

    #[inline(always)]
    fn local(x: u32, y: u32) -> (u32, u32) {
        (x % CHUNK_SIZE, y % CHUNK_SIZE)
    }

    // ---- pixel access -------------------------------------------------------

    /// Read a pixel (transparent for missing chunks or out-of-bounds).
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> &Rgba<u8> {
        if x >= self.width || y >= self.height {
            return &TRANSPARENT_PIXEL;
        }
        let (cx, cy) = Self::chunk_coord(x, y);
        let (lx, ly) = Self::local(x, y);
        self.chunks[self.flat_index(cx, cy)]
            .as_ref()
            .map(|c| c.get_pixel(lx, ly))
            .unwrap_or(&TRANSPARENT_PIXEL)
    }

    /// Overwrite a pixel (creates the chunk on demand, COW-clones if shared).
    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (cx, cy) = Self::chunk_coord(x, y);
        let (lx, ly) = Self::local(x, y);
        let idx = self.flat_index(cx, cy);
        let arc = self.chunks[idx]
            .get_or_insert_with(|| Arc::new(RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE)));
        Arc::make_mut(arc).put_pixel(lx, ly, pixel);
    }

    /// Source-over `color` onto the pixels `x0..x1` of row `y`.
    /// Columns outside the raster are skipped.
    pub fn blend_span(&mut self, y: u32, x0: u32, x1: u32, color: Rgba<u8>) {
        if y >= self.height || color[3] == 0 {
            return;
        }
        let x1 = x1.min(self.width);
        let mut x = x0;
        while x < x1 {
            let (cx, cy) = Self::chunk_coord(x, y);
            let (lx, ly) = Self::local(x, y);
            let run = (CHUNK_SIZE - lx).min(x1 - x);
            let idx = self.flat_index(cx, cy);
            let arc = self.chunks[idx]
                .get_or_insert_with(|| Arc::new(RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE)));
            let chunk = Arc::make_mut(arc);
            for i in 0..run {
                let px = chunk.get_pixel_mut(lx + i, ly);
                *px = blend_over(*px, color);
            }
            x += run;
        }
    }

    // ---- snapshots ------------------------------------------------------------

    /// Capture the current pixel content. O(chunks), no pixel copies.
    pub fn snapshot(&self) -> OverlaySnapshot {
        OverlaySnapshot {
            pixels: self.clone(),
        }
    }

    /// Put back exactly what `snapshot` captured.
    pub fn restore(&mut self, snapshot: &OverlaySnapshot) {
        debug_assert_eq!(
            (self.width, self.height),
            (snapshot.pixels.width, snapshot.pixels.height)
        );
        self.chunks.clone_from(&snapshot.pixels.chunks);
    }

    // ---- bulk operations ----------------------------------------------------

    /// Drop all chunks (make the overlay fully transparent).
    pub fn clear(&mut self) {
        for slot in &mut self.chunks {
            *slot = None;
        }
    }

    /// True when no pixel has ever been written since creation or `clear`.
    pub fn is_blank(&self) -> bool {
        self.chunks.iter().all(|c| c.is_none())
    }

    /// Number of populated chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Porter–Duff source-over of straight-alpha `top` onto `base`.
///
/// Fully transparent `top` leaves `base` untouched; fully opaque `top`
/// replaces it.
#[inline]
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    if top[3] == 0 {
        return base;
    }
    if top[3] == 255 {
        return top;
    }

    let base_a = base[3] as f32 / 255.0;
    let top_a = top[3] as f32 / 255.0;

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |b: u8, t: u8| -> u8 {
        let b = b as f32 / 255.0;
        let t = t as f32 / 255.0;
        let v = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(base[0], top[0]),
        channel(base[1], top[1]),
        channel(base[2], top[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_overlay_is_blank() {
        let o = OverlayRaster::new(130, 70);
        assert!(o.is_blank());
        assert_eq!(*o.get_pixel(129, 69), Rgba([0, 0, 0, 0]));
        assert_eq!(*o.get_pixel(500, 500), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn span_crosses_chunk_boundary() {
        let mut o = OverlayRaster::new(200, 10);
        o.blend_span(3, 60, 70, Rgba([0, 0, 255, 255]));
        assert_eq!(o.chunk_count(), 2);
        assert_eq!(o.get_pixel(59, 3)[3], 0);
        assert_eq!(*o.get_pixel(60, 3), Rgba([0, 0, 255, 255]));
        assert_eq!(*o.get_pixel(69, 3), Rgba([0, 0, 255, 255]));
        assert_eq!(o.get_pixel(70, 3)[3], 0);
    }

    #[test]
    fn restore_is_exact_and_cheap() {
        let mut o = OverlayRaster::new(100, 100);
        o.blend_span(10, 0, 100, Rgba([255, 0, 0, 128]));
        let snap = o.snapshot();
        let before = o.to_rgba_image();

        o.blend_span(10, 0, 100, Rgba([0, 255, 0, 200]));
        o.blend_span(90, 0, 100, Rgba([0, 255, 0, 200]));
        assert_ne!(o.to_rgba_image(), before);

        o.restore(&snap);
        assert_eq!(o.to_rgba_image(), before);
        assert_eq!(o.chunk_count(), 2);
    }

    #[test]
    fn snapshot_is_not_affected_by_later_writes() {
        let mut o = OverlayRaster::new(10, 10);
        o.put_pixel(1, 1, Rgba([1, 2, 3, 4]));
        let snap = o.snapshot();
        o.put_pixel(1, 1, Rgba([9, 9, 9, 9]));
        o.restore(&snap);
        assert_eq!(*o.get_pixel(1, 1), Rgba([1, 2, 3, 4]));
    }

    #[test]
    fn round_trips_through_rgba_image() {
        let mut src = RgbaImage::new(70, 65);
        src.put_pixel(69, 64, Rgba([5, 6, 7, 8]));
        src.put_pixel(0, 0, Rgba([1, 1, 1, 255]));
        let o = OverlayRaster::from_rgba_image(&src);
        assert_eq!(o.to_rgba_image(), src);
    }

    #[test]
    fn blend_over_identities() {
        let base = Rgba([10, 200, 30, 255]);
        assert_eq!(blend_over(base, Rgba([99, 99, 99, 0])), base);
        assert_eq!(blend_over(base, Rgba([1, 2, 3, 255])), Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn blend_over_half_alpha_on_opaque() {
        let out = blend_over(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 128]));
        assert_eq!(out[3], 255);
        assert!((127..=129).contains(&out[0]));
    }

    #[test]
    fn blend_over_onto_transparent_keeps_top_color() {
        let out = blend_over(Rgba([0, 0, 0, 0]), Rgba([255, 0, 0, 128]));
        assert_eq!(out, Rgba([255, 0, 0, 128]));
    }
}

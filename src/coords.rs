//! Display-space → raster-space pointer translation.
//!
//! The surface showing a raster may be scaled by layout, so pointer offsets
//! reported against it must be rescaled to the raster's native pixel grid on
//! every event. Nothing here is cached.

/// Size of the surface as currently rendered on screen, in display units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplaySize {
    pub width: f32,
    pub height: f32,
}

impl DisplaySize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// A surface rendered at exactly the raster's native size.
    pub fn native(width: u32, height: u32) -> Self {
        Self::new(width as f32, height as f32)
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// A pointer event offset relative to the surface's top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerPos {
    pub x: f32,
    pub y: f32,
}

impl PointerPos {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Map `(px, py)` on a surface rendered at `rendered` to native raster
/// coordinates: `(px·W/w, py·H/h)`.
///
/// Results are not clamped; points outside the raster are passed on as-is.
/// A degenerate (zero-sized) rendered surface maps every point to the origin
/// rather than producing infinities.
pub fn map_to_raster(native: (u32, u32), rendered: DisplaySize, pointer: PointerPos) -> (f32, f32) {
    if rendered.is_degenerate() {
        return (0.0, 0.0);
    }
    let (w, h) = native;
    (
        pointer.x * w as f32 / rendered.width,
        pointer.y * h as f32 / rendered.height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_map_to_corners() {
        let rendered = DisplaySize::new(480.0, 270.0);
        assert_eq!(map_to_raster((1920, 1080), rendered, PointerPos::new(0.0, 0.0)), (0.0, 0.0));
        assert_eq!(
            map_to_raster((1920, 1080), rendered, PointerPos::new(480.0, 270.0)),
            (1920.0, 1080.0)
        );
    }

    #[test]
    fn scales_each_axis_independently() {
        let (x, y) = map_to_raster((1000, 500), DisplaySize::new(250.0, 250.0), PointerPos::new(10.0, 10.0));
        assert_eq!((x, y), (40.0, 20.0));
    }

    #[test]
    fn out_of_range_is_not_clamped() {
        let (x, y) = map_to_raster((100, 100), DisplaySize::new(50.0, 50.0), PointerPos::new(-5.0, 60.0));
        assert_eq!((x, y), (-10.0, 120.0));
    }

    #[test]
    fn identical_inputs_identical_outputs() {
        let r = DisplaySize::new(333.0, 777.0);
        let p = PointerPos::new(12.5, 301.25);
        assert_eq!(map_to_raster((2048, 4096), r, p), map_to_raster((2048, 4096), r, p));
    }

    #[test]
    fn reflow_changes_mapping() {
        let p = PointerPos::new(100.0, 100.0);
        let before = map_to_raster((800, 800), DisplaySize::new(400.0, 400.0), p);
        let after = map_to_raster((800, 800), DisplaySize::new(800.0, 800.0), p);
        assert_eq!(before, (200.0, 200.0));
        assert_eq!(after, (100.0, 100.0));
    }

    #[test]
    fn zero_sized_surface_maps_to_origin() {
        let p = PointerPos::new(3.0, 4.0);
        assert_eq!(map_to_raster((10, 10), DisplaySize::new(0.0, 10.0), p), (0.0, 0.0));
    }
}

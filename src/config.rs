use image::Rgba;

/// Width, in raster pixels, that one brush-size unit is calibrated against.
/// A brush of size `s` on an image `W` pixels wide is drawn `s · W / 1000`
/// pixels thick, so strokes look the same at every resolution.
pub const REFERENCE_UNIT_WIDTH: f32 = 1000.0;

pub const DEFAULT_BRUSH_SIZE: f32 = 20.0;
pub const MIN_BRUSH_SIZE: f32 = 5.0;
pub const MAX_BRUSH_SIZE: f32 = 100.0;

/// Translucent red used for mask strokes and rectangle outlines.
pub const HIGHLIGHT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 128]);

/// Background that exported records are flattened onto.
pub const FLATTEN_MATTE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Tunables for paint sessions and exported records.
#[derive(Clone, Debug)]
pub struct EditorConfig {
    pub reference_unit_width: f32,
    pub default_brush_size: f32,
    pub min_brush_size: f32,
    pub max_brush_size: f32,
    pub stroke_color: Rgba<u8>,
    pub flatten_matte: Rgba<u8>,
    /// Appended to the source label for exported derivatives.
    pub derived_label_suffix: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            reference_unit_width: REFERENCE_UNIT_WIDTH,
            default_brush_size: DEFAULT_BRUSH_SIZE,
            min_brush_size: MIN_BRUSH_SIZE,
            max_brush_size: MAX_BRUSH_SIZE,
            stroke_color: HIGHLIGHT_COLOR,
            flatten_matte: FLATTEN_MATTE,
            derived_label_suffix: "(masked)".to_string(),
        }
    }
}

impl EditorConfig {
    pub fn clamp_brush_size(&self, size: f32) -> f32 {
        if size.is_nan() {
            return self.default_brush_size;
        }
        size.clamp(self.min_brush_size, self.max_brush_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brush_size_is_clamped() {
        let cfg = EditorConfig::default();
        assert_eq!(cfg.clamp_brush_size(1.0), 5.0);
        assert_eq!(cfg.clamp_brush_size(250.0), 100.0);
        assert_eq!(cfg.clamp_brush_size(42.0), 42.0);
        assert_eq!(cfg.clamp_brush_size(f32::NAN), DEFAULT_BRUSH_SIZE);
    }
}

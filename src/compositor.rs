// ============================================================================
// COMPOSITOR: flatten overlay strokes onto the base image
// ============================================================================

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::artifact::{ImageRecord, derive_label};
use crate::canvas::{OverlayRaster, blend_over};
use crate::config::EditorConfig;
use crate::error::{EditorError, Result};
use crate::paint::PaintSession;
use crate::raster::RasterImage;
use crate::log_info;

/// Alpha-over `overlay` onto `base` at the origin, producing a new raster.
///
/// Both inputs must be present and the same size; a missing input is a
/// `Precondition` error, never a silent no-op.
pub fn composite(base: Option<&RasterImage>, overlay: Option<&OverlayRaster>) -> Result<RasterImage> {
    let base = base.ok_or_else(|| EditorError::Precondition("base image not loaded".into()))?;
    let overlay =
        overlay.ok_or_else(|| EditorError::Precondition("overlay raster not allocated".into()))?;

    let (w, h) = base.dimensions();
    if (overlay.width(), overlay.height()) != (w, h) {
        return Err(EditorError::Precondition(format!(
            "overlay is {}x{} but base is {}x{}",
            overlay.width(),
            overlay.height(),
            w,
            h
        )));
    }

    let mut out = base.pixels().as_raw().clone();
    if !overlay.is_blank() {
        let stride = w as usize * 4;
        out.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
            let y = y as u32;
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let top = *overlay.get_pixel(x as u32, y);
                if top[3] == 0 {
                    continue;
                }
                let below = image::Rgba([px[0], px[1], px[2], px[3]]);
                px.copy_from_slice(&blend_over(below, top).0);
            }
        });
    }

    let img = RgbaImage::from_raw(w, h, out).ok_or_else(|| {
        EditorError::ContextUnavailable("composited buffer has the wrong length".into())
    })?;
    Ok(RasterImage::new(img))
}

/// Composite a session's overlay onto its base.
pub fn composite_session(session: &PaintSession) -> Result<RasterImage> {
    composite(Some(session.base()), Some(session.overlay()))
}

/// Blend `raster` over an opaque `matte` so no pixel is left translucent.
///
/// Fully opaque rasters come back unchanged.
pub fn flatten(raster: &RasterImage, matte: Rgba<u8>) -> RasterImage {
    if raster.pixels().pixels().all(|p| p[3] == 255) {
        return raster.clone();
    }
    let matte = Rgba([matte[0], matte[1], matte[2], 255]);
    let mut out = raster.pixels().clone();
    out.par_chunks_mut(4).for_each(|px| {
        let top = Rgba([px[0], px[1], px[2], px[3]]);
        let mut flat = blend_over(matte, top);
        flat[3] = 255;
        px.copy_from_slice(&flat.0);
    });
    RasterImage::new(out)
}

/// Flatten and encode a composited raster, and wrap it as a new record
/// derived from `source_label`.
///
/// The record keeps the source image's aspect ratio.
pub fn build_record(
    composited: &RasterImage,
    source: &RasterImage,
    source_label: &str,
    config: &EditorConfig,
) -> Result<ImageRecord> {
    let png = flatten(composited, config.flatten_matte).encode_png()?;
    let label = derive_label(source_label, &config.derived_label_suffix);
    let record = ImageRecord::new(label, source.aspect_ratio(), png);
    log_info!(
        "export: record {} '{}' ({} bytes, {})",
        record.id,
        record.label,
        record.png.len(),
        record.aspect_ratio
    );
    Ok(record)
}

/// Composite, encode and wrap in one call.
pub fn export(session: &PaintSession, source_label: &str, config: &EditorConfig) -> Result<ImageRecord> {
    let composited = composite_session(session)?;
    build_record(&composited, session.base(), source_label, config)
}

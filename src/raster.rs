use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbaImage};

use crate::error::{EditorError, Result};

/// Decoded, immutable pixel buffer at native resolution.
///
/// Cloning is cheap: the pixels live behind an `Arc`, so a paint session can
/// hold the base image by shared reference while the gallery keeps its own.
/// Every edit produces a new `RasterImage` instead of mutating this one.
#[derive(Clone, Debug)]
pub struct RasterImage {
    pixels: Arc<RgbaImage>,
}

impl RasterImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// Decode any format the `image` crate understands (PNG, JPEG, WEBP, BMP).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| EditorError::RasterDecode(e.to_string()))?
            .into_rgba8();
        if img.width() == 0 || img.height() == 0 {
            return Err(EditorError::RasterDecode("image has zero size".into()));
        }
        Ok(Self::new(img))
    }

    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| EditorError::RasterDecode(format!("{}: {}", path.display(), e)))?;
        Self::decode(&bytes)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// True when both handles point at the same decoded buffer.
    pub fn ptr_eq(&self, other: &RasterImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        AspectRatio::from_dimensions(self.width(), self.height())
    }

    /// Encode as PNG (alpha preserved).
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        encode_png(&self.pixels)
    }
}

pub(crate) fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    PngEncoder::new(&mut out)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ColorType::Rgba8,
        )
        .map_err(|e| EditorError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

/// Width:height ratio reduced to lowest terms, e.g. `16:9`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_dimensions(width, height)
    }

    pub fn from_dimensions(width: u32, height: u32) -> Self {
        let g = gcd(width, height).max(1);
        Self {
            width: width / g,
            height: height / g,
        }
    }

    /// Parse `"W:H"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.split_once(':')?;
        let w: u32 = w.trim().parse().ok()?;
        let h: u32 = h.trim().parse().ok()?;
        if w == 0 || h == 0 {
            return None;
        }
        Some(Self::from_dimensions(w, h))
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn decode_rejects_garbage() {
        let err = RasterImage::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, EditorError::RasterDecode(_)));
    }

    #[test]
    fn png_keeps_alpha() {
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(1, 1, Rgba([10, 20, 30, 40]));
        let raster = RasterImage::new(img);
        let bytes = raster.encode_png().unwrap();
        let back = RasterImage::decode(&bytes).unwrap();
        assert_eq!(back.dimensions(), (3, 2));
        assert_eq!(*back.pixels().get_pixel(1, 1), Rgba([10, 20, 30, 40]));
        assert_eq!(back.pixels().get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn aspect_ratio_reduces() {
        assert_eq!(AspectRatio::from_dimensions(1920, 1080).to_string(), "16:9");
        assert_eq!(AspectRatio::parse("4:3"), Some(AspectRatio { width: 4, height: 3 }));
        assert_eq!(AspectRatio::parse("0:3"), None);
        assert_eq!(AspectRatio::parse("wide"), None);
    }

    #[test]
    fn clones_share_pixels() {
        let a = RasterImage::new(RgbaImage::new(4, 4));
        let b = a.clone();
        assert!(a.ptr_eq(&b));
    }
}

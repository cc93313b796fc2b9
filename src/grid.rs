// ============================================================================
// GRID PARTITIONER: slice one composite raster into row-major panels
// ============================================================================

use rayon::prelude::*;

use crate::error::{EditorError, Result};
use crate::raster::RasterImage;
use crate::{log_info, log_warn};

/// Layout of a generated composite: `rows × cols` cells, of which the first
/// `panel_count` (row-major) carry real panels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridSpec {
    rows: u32,
    cols: u32,
    panel_count: u32,
}

impl GridSpec {
    pub fn new(rows: u32, cols: u32, panel_count: u32) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(EditorError::Precondition(format!(
                "grid needs at least one row and column, got {}x{}",
                rows, cols
            )));
        }
        let cells = rows.checked_mul(cols).ok_or_else(|| {
            EditorError::Precondition(format!("{}x{} grid has too many cells", rows, cols))
        })?;
        if panel_count == 0 || panel_count > cells {
            return Err(EditorError::Precondition(format!(
                "panel count {} outside 1..={} for a {}x{} grid",
                panel_count, cells, rows, cols
            )));
        }
        Ok(Self {
            rows,
            cols,
            panel_count,
        })
    }

    /// Every cell of the grid is a panel.
    pub fn full(rows: u32, cols: u32) -> Result<Self> {
        Self::new(rows, cols, rows.saturating_mul(cols))
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn panel_count(&self) -> u32 {
        self.panel_count
    }

    /// `rows × cols`; `new` guarantees this fits in a `u32`.
    pub fn cell_count(&self) -> u32 {
        self.rows * self.cols
    }

    /// `(row, col)` of the row-major cell `index`.
    pub fn cell(&self, index: u32) -> (u32, u32) {
        (index / self.cols, index % self.cols)
    }
}

/// Pixel rectangle of one grid cell inside the composite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One cropped panel, tagged with where it came from.
#[derive(Clone, Debug)]
pub struct Tile {
    pub index: u32,
    pub row: u32,
    pub col: u32,
    pub image: RasterImage,
}

/// `(floor(W/C), floor(H/R))`.
pub fn cell_size(width: u32, height: u32, rows: u32, cols: u32) -> (u32, u32) {
    (width / cols.max(1), height / rows.max(1))
}

pub fn cell_rect(width: u32, height: u32, rows: u32, cols: u32, row: u32, col: u32) -> CellRect {
    let (cw, ch) = cell_size(width, height, rows, cols);
    CellRect {
        x: col * cw,
        y: row * ch,
        width: cw,
        height: ch,
    }
}

/// Crop all `rows × cols` cells in row-major order.
///
/// Remainder columns/rows on the right and bottom edges are dropped; tiles
/// are straight crops and never resampled.
pub fn partition(composite: &RasterImage, rows: u32, cols: u32) -> Result<Vec<Tile>> {
    let grid = GridSpec::full(rows, cols)?;
    Ok(crop_cells(composite, &grid))
}

fn crop_cells(composite: &RasterImage, grid: &GridSpec) -> Vec<Tile> {
    let (rows, cols) = (grid.rows, grid.cols);
    let (w, h) = composite.dimensions();
    let (cw, ch) = cell_size(w, h, rows, cols);
    if cw == 0 || ch == 0 {
        log_warn!(
            "partition: {}x{} composite is smaller than its {}x{} grid, tiles will be empty",
            w, h, rows, cols
        );
    }

    let src = composite.pixels();
    let tiles: Vec<Tile> = (0..grid.cell_count())
        .into_par_iter()
        .map(|index| {
            let (row, col) = (index / cols, index % cols);
            let rect = cell_rect(w, h, rows, cols, row, col);
            let crop = image::imageops::crop_imm(src, rect.x, rect.y, rect.width, rect.height)
                .to_image();
            Tile {
                index,
                row,
                col,
                image: RasterImage::new(crop),
            }
        })
        .collect();

    log_info!(
        "partition: {}x{} → {} tiles of {}x{} (discarded {} cols, {} rows)",
        w, h, tiles.len(), cw, ch, w - cw * cols, h - ch * rows
    );
    tiles
}

/// Partition and keep only the first `panel_count` tiles.
pub fn slice_panels(composite: &RasterImage, spec: &GridSpec) -> Vec<Tile> {
    let mut tiles = crop_cells(composite, spec);
    tiles.truncate(spec.panel_count as usize);
    tiles
}

/// Decode an encoded composite and slice it. Decode failures yield no tiles.
pub fn slice_encoded(bytes: &[u8], spec: &GridSpec) -> Result<Vec<Tile>> {
    let composite = RasterImage::decode(bytes)?;
    Ok(slice_panels(&composite, spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    /// Each pixel encodes its own coordinates so crops can be checked exactly.
    fn coord_image(w: u32, h: u32) -> RasterImage {
        RasterImage::new(RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, (x / 256) as u8, (y / 256 + 1) as u8])
        }))
    }

    #[test]
    fn spec_rejects_bad_counts() {
        assert!(GridSpec::new(0, 3, 1).is_err());
        assert!(GridSpec::new(2, 3, 7).is_err());
        assert!(GridSpec::new(2, 3, 0).is_err());
        assert!(GridSpec::new(2, 3, 6).is_ok());
    }

    #[test]
    fn oversized_grid_is_rejected_not_overflowed() {
        let err = GridSpec::new(70_000, 70_000, 1).unwrap_err();
        assert!(matches!(err, EditorError::Precondition(_)));
        assert!(GridSpec::full(u32::MAX, 2).is_err());
        assert!(partition(&coord_image(4, 4), 70_000, 70_000).is_err());
        assert!(partition(&coord_image(4, 4), 0, 2).is_err());

        let spec = GridSpec::new(65_535, 65_537, 3).unwrap();
        assert_eq!(spec.cell_count(), u32::MAX);
        assert_eq!((spec.rows(), spec.cols(), spec.panel_count()), (65_535, 65_537, 3));
    }

    #[test]
    fn nine_hundred_by_six_hundred_two_by_three_five_panels() {
        let composite = coord_image(900, 600);
        let spec = GridSpec::new(2, 3, 5).unwrap();
        let tiles = slice_panels(&composite, &spec);

        assert_eq!(tiles.len(), 5);
        let cells: Vec<(u32, u32)> = tiles.iter().map(|t| (t.row, t.col)).collect();
        assert_eq!(cells, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1)]);
        for t in &tiles {
            assert_eq!(t.image.dimensions(), (300, 300));
            let origin = *t.image.pixels().get_pixel(0, 0);
            let expected = *composite.pixels().get_pixel(t.col * 300, t.row * 300);
            assert_eq!(origin, expected);
        }
    }

    #[test]
    fn remainder_is_discarded_not_resampled() {
        let composite = coord_image(10, 7);
        let tiles = partition(&composite, 2, 3).unwrap();
        assert_eq!(tiles.len(), 6);
        for t in &tiles {
            assert_eq!(t.image.dimensions(), (3, 3));
            for y in 0..3 {
                for x in 0..3 {
                    assert_eq!(
                        t.image.pixels().get_pixel(x, y),
                        composite.pixels().get_pixel(t.col * 3 + x, t.row * 3 + y)
                    );
                }
            }
        }
        // Column 9 and row 6 never appear in any tile.
        let covered_w = 3 * 3;
        let covered_h = 3 * 2;
        assert_eq!(10 - covered_w, 1);
        assert_eq!(7 - covered_h, 1);
    }

    #[test]
    fn tile_index_maps_to_row_major_cell() {
        let spec = GridSpec::full(3, 4).unwrap();
        let composite = coord_image(40, 30);
        for (i, t) in partition(&composite, 3, 4).unwrap().iter().enumerate() {
            assert_eq!(t.index as usize, i);
            assert_eq!(spec.cell(t.index), (t.row, t.col));
            assert_eq!((t.row, t.col), (i as u32 / 4, i as u32 % 4));
        }
    }

    #[test]
    fn tiles_never_overlap() {
        let (w, h, rows, cols) = (101, 53, 4, 5);
        let mut seen = vec![false; (w * h) as usize];
        for row in 0..rows {
            for col in 0..cols {
                let r = cell_rect(w, h, rows, cols, row, col);
                for y in r.y..r.y + r.height {
                    for x in r.x..r.x + r.width {
                        let i = (y * w + x) as usize;
                        assert!(!seen[i], "pixel ({}, {}) claimed twice", x, y);
                        seen[i] = true;
                    }
                }
            }
        }
        let discarded = seen.iter().filter(|s| !**s).count() as u32;
        // 101 % 5 = 1 column, 53 % 4 = 1 row
        assert_eq!(discarded, 53 + 101 - 1);
    }

    #[test]
    fn undecodable_composite_yields_error() {
        let spec = GridSpec::full(1, 1).unwrap();
        let err = slice_encoded(&[0u8; 16], &spec).unwrap_err();
        assert!(matches!(err, EditorError::RasterDecode(_)));
    }

    #[test]
    fn tiny_composite_gives_empty_tiles() {
        let tiles = partition(&coord_image(2, 2), 1, 3).unwrap();
        assert_eq!(tiles.len(), 3);
        assert!(tiles.iter().all(|t| t.image.dimensions() == (0, 2)));
    }
}

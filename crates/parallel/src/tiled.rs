//! Tile planning for large regions of interest

use geo::{coord, Intersects, Rect};
use histotile_core::{Error, Result, Roi};

/// Default tile edge in full-resolution pixels
pub const DEFAULT_TILE_SIZE: f64 = 4096.0;

/// A tile covering part of a parent region, in full-resolution pixels
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    /// Row index in the plan
    pub row: usize,
    /// Column index in the plan
    pub col: usize,
    pub bounds: Rect<f64>,
}

/// Iterator over tiles covering a rectangle, row by row
pub struct TileIterator {
    area: Rect<f64>,
    tile_size: f64,
    overlap: f64,
    row: usize,
    col: usize,
}

impl TileIterator {
    fn origin(&self) -> (f64, f64) {
        (
            self.area.min().x + self.col as f64 * self.tile_size,
            self.area.min().y + self.row as f64 * self.tile_size,
        )
    }
}

impl Iterator for TileIterator {
    type Item = Tile;

    fn next(&mut self) -> Option<Self::Item> {
        let (x, y) = self.origin();
        if y >= self.area.max().y || self.area.width() <= 0.0 {
            return None;
        }

        // Clip the tile plus overlap to the covered area
        let min_x = (x - self.overlap).max(self.area.min().x);
        let min_y = (y - self.overlap).max(self.area.min().y);
        let max_x = (x + self.tile_size + self.overlap).min(self.area.max().x);
        let max_y = (y + self.tile_size + self.overlap).min(self.area.max().y);

        let tile = Tile {
            row: self.row,
            col: self.col,
            bounds: Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y }),
        };

        self.col += 1;
        if self.origin().0 >= self.area.max().x {
            self.col = 0;
            self.row += 1;
        }

        Some(tile)
    }
}

/// Splits parent regions into square tiles processed as separate units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilePlan {
    tile_size: f64,
    overlap: f64,
}

impl TilePlan {
    /// Tiles of `tile_size` full-resolution pixels, each grown by `overlap` on every side
    pub fn new(tile_size: f64, overlap: f64) -> Result<Self> {
        if !(tile_size.is_finite() && tile_size >= 1.0) {
            return Err(Error::InvalidParameter {
                name: "tile_size",
                value: tile_size.to_string(),
                reason: "tile size must be at least one pixel".to_string(),
            });
        }
        if !(overlap.is_finite() && overlap >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "overlap",
                value: overlap.to_string(),
                reason: "overlap must be finite and not negative".to_string(),
            });
        }
        Ok(Self { tile_size, overlap })
    }

    pub fn tile_size(&self) -> f64 {
        self.tile_size
    }

    /// Tiles covering `area`
    pub fn tiles(&self, area: Rect<f64>) -> TileIterator {
        TileIterator {
            area,
            tile_size: self.tile_size,
            overlap: self.overlap,
            row: 0,
            col: 0,
        }
    }

    /// Tiles covering the bounds of `roi` that touch the ROI itself
    pub fn tiles_for_roi(&self, roi: &Roi) -> Vec<Tile> {
        let bounds = roi.bounds();
        if roi.is_rectangle() {
            return self.tiles(bounds).collect();
        }
        let outline = roi.to_polygon();
        self.tiles(bounds)
            .filter(|tile| outline.intersects(&tile.bounds))
            .collect()
    }
}

impl Default for TilePlan {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            overlap: 0.0,
        }
    }
}

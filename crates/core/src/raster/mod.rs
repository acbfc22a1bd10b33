//! Image data structures and operations

mod element;
mod grid;
mod neighborhood;
pub mod rgb;

pub use element::RasterElement;
pub use grid::Raster;
pub use neighborhood::{Connectivity, Neighborhood};

/// Single-channel floating point image; NaN marks masked pixels.
pub type ScalarImage = Raster<f32>;

/// Label image; 0 is background, objects are numbered from 1.
pub type LabelImage = Raster<u32>;

/// Packed `0x00RRGGBB` image as read from a region source.
pub type RgbImage = Raster<u32>;

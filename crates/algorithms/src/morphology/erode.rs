//! Morphological erosion (minimum filter)
//!
//! Replaces each pixel with the minimum value in its structuring element
//! neighborhood. Shrinks bright regions and enlarges dark regions.

use histotile_core::{Raster, RasterElement, Result};

use super::element::StructuringElement;
use super::extremum::{neighborhood_extremum, Extremum};

/// Perform morphological erosion.
///
/// Near the image border only the in-bounds part of the element is used,
/// and NaN neighbours are skipped.
pub fn erode<T: RasterElement>(image: &Raster<T>, element: &StructuringElement) -> Result<Raster<T>> {
    neighborhood_extremum(image, element, Extremum::Min)
}

//! Morphological dilation (maximum filter)
//!
//! Replaces each pixel with the maximum value in its structuring element
//! neighborhood. Expands bright regions; on label images it grows labels
//! over background and closes one-pixel gaps between regions.

use histotile_core::{Raster, RasterElement, Result};

use super::element::StructuringElement;
use super::extremum::{neighborhood_extremum, Extremum};

/// Perform morphological dilation.
///
/// Near the image border only the in-bounds part of the element is used,
/// and NaN neighbours are skipped.
pub fn dilate<T: RasterElement>(image: &Raster<T>, element: &StructuringElement) -> Result<Raster<T>> {
    neighborhood_extremum(image, element, Extremum::Max)
}

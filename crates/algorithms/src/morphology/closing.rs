//! Morphological closing (dilation followed by erosion)
//!
//! Fills dark features smaller than the structuring element.

use histotile_core::{Raster, RasterElement, Result};

use super::dilate::dilate;
use super::element::StructuringElement;
use super::erode::erode;

/// Dilate then erode with the same element
pub fn closing<T: RasterElement>(image: &Raster<T>, element: &StructuringElement) -> Result<Raster<T>> {
    let dilated = dilate(image, element)?;
    erode(&dilated, element)
}

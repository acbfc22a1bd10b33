//! Morphological opening (erosion followed by dilation)
//!
//! Removes bright features smaller than the structuring element while
//! preserving the shape of larger bright regions.

use histotile_core::{Raster, RasterElement, Result};

use super::dilate::dilate;
use super::element::StructuringElement;
use super::erode::erode;

/// Erode then dilate with the same element
pub fn opening<T: RasterElement>(image: &Raster<T>, element: &StructuringElement) -> Result<Raster<T>> {
    let eroded = erode(image, element)?;
    dilate(&eroded, element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use histotile_core::ScalarImage;

    #[test]
    fn test_opening_removes_bright_spot() {
        let mut image = ScalarImage::filled(11, 11, 5.0);
        image.set(5, 5, 100.0).unwrap();
        let result = opening(&image, &StructuringElement::Square(1)).unwrap();
        assert_eq!(result.get(5, 5).unwrap(), 5.0);
    }

    #[test]
    fn test_opening_preserves_large_region() {
        let mut image = ScalarImage::filled(11, 11, 5.0);
        for r in 3..8 {
            for c in 3..8 {
                image.set(r, c, 100.0).unwrap();
            }
        }
        let result = opening(&image, &StructuringElement::Square(1)).unwrap();
        assert_eq!(result.get(5, 5).unwrap(), 100.0);
        assert_eq!(result.get(3, 3).unwrap(), 100.0);
        assert_eq!(result.get(2, 2).unwrap(), 5.0);
    }

    #[test]
    fn test_opening_never_exceeds_input() {
        let data = (0..81).map(|i| ((i * 37) % 19) as f32).collect();
        let image = ScalarImage::from_vec(data, 9, 9).unwrap();
        let result = opening(&image, &StructuringElement::Disk(2)).unwrap();
        for (a, b) in result.data().iter().zip(image.data().iter()) {
            assert!(a <= b);
        }
    }
}

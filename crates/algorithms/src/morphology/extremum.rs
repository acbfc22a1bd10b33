//! Minimum / maximum over a structuring element

use histotile_core::{Raster, RasterElement, Result};

use super::element::StructuringElement;
use crate::maybe_rayon::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Extremum {
    Min,
    Max,
}

/// Replace each pixel by the extremum of its neighborhood.
///
/// Offsets falling outside the image are ignored, as are masked (NaN)
/// neighbours. Masked pixels stay masked.
pub(crate) fn neighborhood_extremum<T: RasterElement>(
    image: &Raster<T>,
    element: &StructuringElement,
    extremum: Extremum,
) -> Result<Raster<T>> {
    element.validate()?;

    let (rows, cols) = image.shape();
    let offsets = element.offsets();
    let data = image.data();

    let output: Vec<T> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = Vec::with_capacity(cols);
            for col in 0..cols {
                let center = data[[row, col]];
                if center.is_masked() {
                    row_data.push(center);
                    continue;
                }

                let mut best = center;
                for &(dr, dc) in &offsets {
                    let r = row as isize + dr;
                    let c = col as isize + dc;
                    if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
                        continue;
                    }
                    let v = data[[r as usize, c as usize]];
                    if v.is_masked() {
                        continue;
                    }
                    let better = match extremum {
                        Extremum::Min => v < best,
                        Extremum::Max => v > best,
                    };
                    if better {
                        best = v;
                    }
                }
                row_data.push(best);
            }
            row_data
        })
        .collect();

    image.with_data(output)
}

//! Median filter over a circular neighborhood

use histotile_core::raster::Neighborhood;
use histotile_core::{Result, ScalarImage};

use crate::maybe_rayon::*;

/// Replace each pixel by the median of the pixels within `radius`.
///
/// Out-of-bounds and NaN neighbours are skipped; for an even number of
/// samples the upper median is used. A radius of 0 returns a copy.
pub fn median_filter(image: &ScalarImage, radius: usize) -> Result<ScalarImage> {
    if radius == 0 {
        return Ok(image.clone());
    }
    let (rows, cols) = image.shape();
    let offsets = Neighborhood::Circle(radius).offsets();
    let data = image.data();

    let output: Vec<f32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut window = Vec::with_capacity(offsets.len());
            let mut out = Vec::with_capacity(cols);
            for col in 0..cols {
                if data[[row, col]].is_nan() {
                    out.push(f32::NAN);
                    continue;
                }
                window.clear();
                for &(dr, dc) in &offsets {
                    let r = row as isize + dr;
                    let c = col as isize + dc;
                    if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
                        continue;
                    }
                    let v = data[[r as usize, c as usize]];
                    if !v.is_nan() {
                        window.push(v);
                    }
                }
                let mid = window.len() / 2;
                let (_, median, _) = window.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
                out.push(*median);
            }
            out
        })
        .collect();

    image.with_data(output)
}

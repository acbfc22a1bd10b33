//! Discrete Laplacian

use histotile_core::{Result, ScalarImage};

use crate::maybe_rayon::*;

/// 4-neighbour Laplacian `I[x-1] + I[x+1] + I[y-1] + I[y+1] - 4 I`.
///
/// Border pixels replicate their nearest in-bounds neighbour.
pub fn laplacian(image: &ScalarImage) -> Result<ScalarImage> {
    let (rows, cols) = image.shape();
    let data = image.data();

    let output: Vec<f32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let up = row.saturating_sub(1);
            let down = (row + 1).min(rows - 1);
            (0..cols)
                .map(|col| {
                    let left = col.saturating_sub(1);
                    let right = (col + 1).min(cols - 1);
                    let c = data[[row, col]] as f64;
                    let sum = data[[row, left]] as f64
                        + data[[row, right]] as f64
                        + data[[up, col]] as f64
                        + data[[down, col]] as f64;
                    (sum - 4.0 * c) as f32
                })
                .collect::<Vec<_>>()
        })
        .collect();

    image.with_data(output)
}

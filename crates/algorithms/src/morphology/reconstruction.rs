//! Morphological reconstruction by dilation
//!
//! Grows a marker image under a mask image until stability, 8-connected.
//! Uses the hybrid scheme of a forward raster scan, a backward raster scan
//! and a FIFO propagation of the pixels that can still change.

use std::collections::VecDeque;

use histotile_core::{Result, ScalarImage};

/// Neighbours visited before a pixel in raster order
const FORWARD: [(isize, isize); 4] = [(-1, -1), (-1, 0), (-1, 1), (0, -1)];
/// Neighbours visited before a pixel in reverse raster order
const BACKWARD: [(isize, isize); 4] = [(0, 1), (1, -1), (1, 0), (1, 1)];

/// Reconstruct `marker` under `mask`.
///
/// The result starts from `min(marker, mask)` and is the largest image
/// obtainable by repeated 8-connected dilation of it that stays below the
/// mask. Reconstruction is idempotent. NaN pixels of either image are
/// NaN in the result and do not propagate.
pub fn reconstruct_by_dilation(marker: &ScalarImage, mask: &ScalarImage) -> Result<ScalarImage> {
    marker.ensure_same_shape(mask)?;
    let (rows, cols) = marker.shape();
    let mask_data = mask.data();

    let mut out = marker.clone();
    {
        let data = out.data_mut();
        for ((row, col), v) in data.indexed_iter_mut() {
            let m = mask_data[[row, col]];
            if m.is_nan() {
                *v = f32::NAN;
            } else if !v.is_nan() && *v > m {
                *v = m;
            }
        }
    }
    if rows == 0 || cols == 0 {
        return Ok(out);
    }

    let data = out.data_mut();
    let neighbour = |row: usize, col: usize, (dr, dc): (isize, isize)| -> Option<(usize, usize)> {
        let r = row as isize + dr;
        let c = col as isize + dc;
        if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
            None
        } else {
            Some((r as usize, c as usize))
        }
    };

    // Forward scan
    for row in 0..rows {
        for col in 0..cols {
            let mut v = data[[row, col]];
            if v.is_nan() {
                continue;
            }
            for &offset in &FORWARD {
                if let Some(q) = neighbour(row, col, offset) {
                    let n = data[q];
                    if n > v {
                        v = n;
                    }
                }
            }
            data[[row, col]] = v.min(mask_data[[row, col]]);
        }
    }

    // Backward scan, queueing pixels whose later neighbours can still grow
    let mut queue = VecDeque::new();
    for row in (0..rows).rev() {
        for col in (0..cols).rev() {
            let mut v = data[[row, col]];
            if v.is_nan() {
                continue;
            }
            for &offset in &BACKWARD {
                if let Some(q) = neighbour(row, col, offset) {
                    let n = data[q];
                    if n > v {
                        v = n;
                    }
                }
            }
            let v = v.min(mask_data[[row, col]]);
            data[[row, col]] = v;

            let can_grow = BACKWARD.iter().any(|&offset| {
                neighbour(row, col, offset).is_some_and(|q| {
                    let n = data[q];
                    n < v && n < mask_data[q]
                })
            });
            if can_grow {
                queue.push_back((row, col));
            }
        }
    }

    // Propagation
    while let Some((row, col)) = queue.pop_front() {
        let v = data[[row, col]];
        for &offset in FORWARD.iter().chain(BACKWARD.iter()) {
            if let Some(q) = neighbour(row, col, offset) {
                let n = data[q];
                let m = mask_data[q];
                if n < v && n != m {
                    data[q] = v.min(m);
                    queue.push_back(q);
                }
            }
        }
    }

    Ok(out)
}

//! Euclidean distance transform
//!
//! Exact squared distances by two passes of the lower-envelope-of-parabolas
//! transform (Felzenszwalb & Huttenlocher), first along columns then along
//! rows.

use histotile_core::{Result, ScalarImage};

use super::BinaryImage;
use crate::maybe_rayon::*;

/// Distance from each foreground pixel to the nearest background pixel.
///
/// Pixels outside the image count as background, so a foreground pixel on
/// the border is at distance 1. Background pixels are 0.
pub fn distance_transform(mask: &BinaryImage) -> Result<ScalarImage> {
    let (rows, cols) = mask.shape();
    // One pixel of background padding on every side
    let (prows, pcols) = (rows + 2, cols + 2);
    let data = mask.data();
    let mut grid = vec![0.0f64; prows * pcols];
    for ((row, col), &m) in data.indexed_iter() {
        if m != 0 {
            grid[(row + 1) * pcols + col + 1] = f64::INFINITY;
        }
    }

    // Columns
    let columns: Vec<Vec<f64>> = (0..pcols)
        .into_par_iter()
        .map(|col| {
            let f: Vec<f64> = (0..prows).map(|row| grid[row * pcols + col]).collect();
            squared_distance_1d(&f)
        })
        .collect();
    for (col, values) in columns.iter().enumerate() {
        for (row, &v) in values.iter().enumerate() {
            grid[row * pcols + col] = v;
        }
    }

    // Rows, cropped back to the image
    let output: Vec<f32> = (1..=rows)
        .into_par_iter()
        .flat_map(|row| {
            let d = squared_distance_1d(&grid[row * pcols..(row + 1) * pcols]);
            d[1..=cols].iter().map(|&v| v.sqrt() as f32).collect::<Vec<_>>()
        })
        .collect();

    let mut out = ScalarImage::from_vec(output, rows, cols)?;
    out.set_calibration(*mask.calibration());
    Ok(out)
}

/// 1D squared distance transform of sampled function `f`
fn squared_distance_1d(f: &[f64]) -> Vec<f64> {
    let n = f.len();
    let mut d = vec![f64::INFINITY; n];
    // Parabola vertices and the boundaries between them
    let mut v = vec![0usize; n];
    let mut z = vec![0.0f64; n + 1];

    let mut k = 0usize;
    let Some(first) = f.iter().position(|x| x.is_finite()) else {
        return d;
    };
    v[0] = first;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;

    for q in first + 1..n {
        if !f[q].is_finite() {
            continue;
        }
        let fq = f[q] + (q * q) as f64;
        let s = loop {
            let p = v[k];
            let s = (fq - (f[p] + (p * p) as f64)) / (2.0 * (q as f64 - p as f64));
            if s <= z[k] && k > 0 {
                k -= 1;
            } else {
                break s;
            }
        };
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }

    k = 0;
    for (q, out) in d.iter_mut().enumerate() {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let p = v[k];
        let dq = q as f64 - p as f64;
        *out = dq * dq + f[p];
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Reference: brute force over all background pixels, padding included
    fn brute_force(mask: &BinaryImage) -> Vec<f32> {
        let (rows, cols) = mask.shape();
        let mut background = Vec::new();
        for r in -1..=rows as isize {
            for c in -1..=cols as isize {
                let inside = r >= 0 && c >= 0 && r < rows as isize && c < cols as isize;
                if !inside || mask.get(r as usize, c as usize).unwrap() == 0 {
                    background.push((r as f64, c as f64));
                }
            }
        }
        (0..rows * cols)
            .map(|i| {
                let (r, c) = ((i / cols) as f64, (i % cols) as f64);
                if mask.get(i / cols, i % cols).unwrap() == 0 {
                    return 0.0;
                }
                background
                    .iter()
                    .map(|&(br, bc)| ((br - r).powi(2) + (bc - c).powi(2)).sqrt())
                    .fold(f64::INFINITY, f64::min) as f32
            })
            .collect()
    }

    #[test]
    fn test_matches_brute_force() {
        let data = (0..12 * 15)
            .map(|i| {
                let (r, c) = (i / 15, i % 15);
                u8::from((r * 5 + c * 3) % 11 != 0 && !(r == 6 && c > 3))
            })
            .collect();
        let mask = BinaryImage::from_vec(data, 12, 15).unwrap();
        let fast = distance_transform(&mask).unwrap();
        let slow = brute_force(&mask);
        for (a, b) in fast.data().iter().zip(slow.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_full_mask_uses_outside_as_background() {
        let mask = BinaryImage::filled(7, 7, 1);
        let dist = distance_transform(&mask).unwrap();
        assert_eq!(dist.get(0, 3).unwrap(), 1.0);
        assert_eq!(dist.get(3, 3).unwrap(), 4.0);
    }

    #[test]
    fn test_empty_mask() {
        let mask = BinaryImage::new(4, 4);
        let dist = distance_transform(&mask).unwrap();
        assert!(dist.data().iter().all(|&d| d == 0.0));
    }
}

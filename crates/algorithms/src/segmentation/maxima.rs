//! Regional maxima with a noise tolerance
//!
//! A local maximum is accepted only if the area reachable from it through
//! pixels no more than `tolerance` below it contains no higher pixel and
//! does not overlap the area of a maximum accepted before. Candidates are
//! examined from the highest value down, so of two nearby peaks only the
//! more prominent one survives.

use std::collections::VecDeque;

use histotile_core::raster::Connectivity;
use histotile_core::{LabelImage, Result, ScalarImage};
use tracing::trace;

use super::BinaryImage;

/// Find maxima of `image` that stand out by more than `tolerance`.
///
/// Returns a marker image with one labelled pixel per accepted maximum
/// (labels from 1 in descending order of value) and the number of maxima.
/// NaN pixels, and pixels outside `mask` when one is given, are ignored.
pub fn find_maxima(
    image: &ScalarImage,
    tolerance: f64,
    mask: Option<&BinaryImage>,
) -> Result<(LabelImage, usize)> {
    if let Some(mask) = mask {
        image.ensure_same_shape(mask)?;
    }
    let (rows, cols) = image.shape();
    let values: Vec<f32> = image.data().iter().copied().collect();
    let admissible: Vec<bool> = match mask {
        Some(mask) => values
            .iter()
            .zip(mask.data().iter())
            .map(|(v, &m)| !v.is_nan() && m != 0)
            .collect(),
        None => values.iter().map(|v| !v.is_nan()).collect(),
    };

    // Local maxima, highest first; ties keep raster order
    let mut candidates: Vec<usize> = (0..rows * cols)
        .filter(|&i| {
            admissible[i]
                && Connectivity::Eight
                    .neighbors(i / cols, i % cols, rows, cols)
                    .all(|q| !admissible[q] || values[q] <= values[i])
        })
        .collect();
    candidates.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));

    let mut claimed = vec![false; rows * cols];
    let mut visited = vec![u32::MAX; rows * cols];
    let mut region = Vec::new();
    let mut queue = VecDeque::new();
    let mut markers = vec![0u32; rows * cols];
    let mut count = 0u32;

    for (stamp, &seed) in candidates.iter().enumerate() {
        if claimed[seed] {
            continue;
        }
        let stamp = stamp as u32;
        let v0 = values[seed] as f64;
        let floor = v0 - tolerance;

        region.clear();
        queue.clear();
        queue.push_back(seed);
        visited[seed] = stamp;
        let mut is_maximum = true;

        'flood: while let Some(p) = queue.pop_front() {
            region.push(p);
            for q in Connectivity::Eight.neighbors(p / cols, p % cols, rows, cols) {
                if visited[q] == stamp || !admissible[q] {
                    continue;
                }
                let v = values[q] as f64;
                if v < floor {
                    continue;
                }
                if v > v0 || claimed[q] {
                    is_maximum = false;
                    break 'flood;
                }
                visited[q] = stamp;
                queue.push_back(q);
            }
        }

        if is_maximum {
            count += 1;
            markers[seed] = count;
            for &p in &region {
                claimed[p] = true;
            }
        }
    }

    trace!("{} of {} local maxima accepted", count, candidates.len());
    Ok((image.with_data(markers)?, count as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_image(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f32) -> ScalarImage {
        let data = (0..rows * cols).map(|i| f(i / cols, i % cols)).collect();
        ScalarImage::from_vec(data, rows, cols).unwrap()
    }

    fn bump(r: usize, c: usize, cr: f32, cc: f32, h: f32) -> f32 {
        let d2 = (r as f32 - cr).powi(2) + (c as f32 - cc).powi(2);
        h * (-d2 / 8.0).exp()
    }

    #[test]
    fn test_two_separate_peaks() {
        let image = make_image(15, 30, |r, c| bump(r, c, 7.0, 7.0, 10.0) + bump(r, c, 7.0, 22.0, 8.0));
        let (markers, n) = find_maxima(&image, 1.0, None).unwrap();
        assert_eq!(n, 2);
        assert_eq!(markers.get(7, 7).unwrap(), 1);
        assert_eq!(markers.get(7, 22).unwrap(), 2);
    }

    #[test]
    fn test_tolerance_merges_shallow_peak() {
        // Second peak rises only 0.5 above the saddle between the two
        let image = make_image(1, 9, |_, c| [0.0, 5.0, 10.0, 5.0, 4.0, 4.5, 4.0, 0.0, 0.0][c]);
        let (_, strict) = find_maxima(&image, 0.1, None).unwrap();
        let (_, tolerant) = find_maxima(&image, 1.0, None).unwrap();
        assert_eq!(strict, 2);
        assert_eq!(tolerant, 1);
    }

    #[test]
    fn test_plateau_gives_one_maximum() {
        let image = ScalarImage::filled(6, 6, 3.0);
        let (markers, n) = find_maxima(&image, 0.5, None).unwrap();
        assert_eq!(n, 1);
        assert_eq!(markers.get(0, 0).unwrap(), 1);
    }

    #[test]
    fn test_mask_excludes_pixels() {
        let image = make_image(1, 5, |_, c| [1.0, 9.0, 1.0, 5.0, 1.0][c]);
        let mask = BinaryImage::from_vec(vec![1, 0, 1, 1, 1], 1, 5).unwrap();
        let (markers, n) = find_maxima(&image, 0.5, Some(&mask)).unwrap();
        // The masked peak disappears and cuts the left pixel off on its own
        assert_eq!(n, 2);
        assert_eq!(markers.get(0, 1).unwrap(), 0);
        assert_eq!(markers.get(0, 3).unwrap(), 1);
        assert_eq!(markers.get(0, 0).unwrap(), 2);
    }
}

//! Marker-controlled watershed
//!
//! Labels grow from marker pixels into unlabelled pixels in order of
//! decreasing elevation, so regions meet along valleys of the elevation
//! image. Pixels of equal elevation are processed first come, first served.
//! With watershed lines enabled, a pixel reached by two different labels
//! stays 0 and separates the regions.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use histotile_core::raster::Connectivity;
use histotile_core::{LabelImage, Result, ScalarImage};

use super::BinaryImage;

/// Flooding options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatershedParams {
    /// Only pixels with elevation above this value are flooded
    pub threshold: Option<f64>,
    /// Keep one-pixel background lines between touching regions
    pub watershed_lines: bool,
    pub connectivity: Connectivity,
}

impl Default for WatershedParams {
    fn default() -> Self {
        Self {
            threshold: None,
            watershed_lines: true,
            connectivity: Connectivity::Eight,
        }
    }
}

/// Pixel in the flooding queue: highest elevation first, then oldest first
#[derive(Debug, Clone, Copy)]
struct Pixel {
    value: f32,
    seq: u64,
    index: usize,
}

impl PartialEq for Pixel {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pixel {}

impl PartialOrd for Pixel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pixel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

const UNSEEN: u8 = 0;
const QUEUED: u8 = 1;
const DONE: u8 = 2;

/// Flood `elevation` from `markers`.
///
/// Pixels that are NaN, outside `mask`, or not above `params.threshold`
/// are never labelled; marker pixels there are dropped.
pub fn watershed(
    elevation: &ScalarImage,
    markers: &LabelImage,
    mask: Option<&BinaryImage>,
    params: &WatershedParams,
) -> Result<LabelImage> {
    elevation.ensure_same_shape(markers)?;
    if let Some(mask) = mask {
        elevation.ensure_same_shape(mask)?;
    }
    let (rows, cols) = elevation.shape();
    let values: Vec<f32> = elevation.data().iter().copied().collect();
    let mask_values: Option<Vec<u8>> = mask.map(|m| m.data().iter().copied().collect());
    let admissible = |i: usize| {
        let v = values[i];
        !v.is_nan()
            && mask_values.as_ref().map_or(true, |m| m[i] != 0)
            && params.threshold.map_or(true, |t| v as f64 > t)
    };

    let mut labels: Vec<u32> = markers
        .data()
        .iter()
        .enumerate()
        .map(|(i, &l)| if l != 0 && admissible(i) { l } else { 0 })
        .collect();
    let mut state: Vec<u8> = labels.iter().map(|&l| if l != 0 { DONE } else { UNSEEN }).collect();

    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;
    for p in 0..rows * cols {
        if labels[p] == 0 {
            continue;
        }
        for q in params.connectivity.neighbors(p / cols, p % cols, rows, cols) {
            if state[q] == UNSEEN && admissible(q) {
                state[q] = QUEUED;
                heap.push(Pixel { value: values[q], seq, index: q });
                seq += 1;
            }
        }
    }

    while let Some(Pixel { index: p, .. }) = heap.pop() {
        state[p] = DONE;
        let mut label = 0;
        let mut conflict = false;
        for q in params.connectivity.neighbors(p / cols, p % cols, rows, cols) {
            let l = labels[q];
            if l == 0 {
                continue;
            }
            if label == 0 {
                label = l;
            } else if l != label {
                conflict = true;
                break;
            }
        }
        if label == 0 || (conflict && params.watershed_lines) {
            continue;
        }
        labels[p] = label;

        for q in params.connectivity.neighbors(p / cols, p % cols, rows, cols) {
            if state[q] == UNSEEN && admissible(q) {
                state[q] = QUEUED;
                heap.push(Pixel { value: values[q], seq, index: q });
                seq += 1;
            }
        }
    }

    markers.with_data(labels)
}

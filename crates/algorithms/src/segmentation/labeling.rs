//! Connected component labeling

use std::collections::VecDeque;

use histotile_core::raster::Connectivity;
use histotile_core::{LabelImage, Raster, Result};

use super::BinaryImage;

/// Label connected foreground components of `mask`.
///
/// Labels are assigned from 1 in raster discovery order. Returns the label
/// image and the number of components.
pub fn label_components(mask: &BinaryImage, connectivity: Connectivity) -> Result<(LabelImage, usize)> {
    let data = mask.data();
    let cols = mask.cols();
    flood_labels(mask, connectivity, |i| data[[i / cols, i % cols]] != 0, |_, _| true)
}

/// Relabel `labels` so that every connected region of equal non-zero value
/// gets its own label; a value split into pieces yields several labels.
pub fn label_regions(labels: &LabelImage, connectivity: Connectivity) -> Result<(LabelImage, usize)> {
    let data = labels.data();
    let cols = labels.cols();
    let at = |i: usize| data[[i / cols, i % cols]];
    flood_labels(labels, connectivity, |i| at(i) != 0, |a, b| at(a) == at(b))
}

fn flood_labels<T, F, S>(
    template: &Raster<T>,
    connectivity: Connectivity,
    is_foreground: F,
    same_region: S,
) -> Result<(LabelImage, usize)>
where
    T: histotile_core::RasterElement,
    F: Fn(usize) -> bool,
    S: Fn(usize, usize) -> bool,
{
    let (rows, cols) = template.shape();
    let mut out = vec![0u32; rows * cols];
    let mut queue = VecDeque::new();
    let mut count = 0u32;

    for start in 0..rows * cols {
        if out[start] != 0 || !is_foreground(start) {
            continue;
        }
        count += 1;
        out[start] = count;
        queue.push_back(start);
        while let Some(p) = queue.pop_front() {
            for q in connectivity.neighbors(p / cols, p % cols, rows, cols) {
                if out[q] == 0 && is_foreground(q) && same_region(p, q) {
                    out[q] = count;
                    queue.push_back(q);
                }
            }
        }
    }

    Ok((template.with_data(out)?, count as usize))
}

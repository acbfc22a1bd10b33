//! Hole filling in binary masks
//!
//! A hole is a 4-connected background component that does not touch the
//! image border.

use std::collections::VecDeque;

use histotile_core::raster::Connectivity;

use super::BinaryImage;

/// Fill every hole of `mask`
pub fn fill_holes(mask: &mut BinaryImage) {
    fill_holes_below(mask, f64::INFINITY);
}

/// Fill holes with fewer than `max_area` pixels
pub fn fill_small_holes(mask: &mut BinaryImage, max_area: f64) {
    fill_holes_below(mask, max_area);
}

fn fill_holes_below(mask: &mut BinaryImage, max_area: f64) {
    let (rows, cols) = mask.shape();
    let data = mask.data_mut();
    let mut seen = vec![false; rows * cols];
    let mut queue = VecDeque::new();
    let mut component = Vec::new();

    for start in 0..rows * cols {
        if seen[start] || data[[start / cols, start % cols]] != 0 {
            continue;
        }
        seen[start] = true;
        queue.push_back(start);
        component.clear();
        let mut touches_border = false;

        while let Some(p) = queue.pop_front() {
            component.push(p);
            let (row, col) = (p / cols, p % cols);
            if row == 0 || col == 0 || row + 1 == rows || col + 1 == cols {
                touches_border = true;
            }
            for q in Connectivity::Four.neighbors(row, col, rows, cols) {
                if !seen[q] && data[[q / cols, q % cols]] == 0 {
                    seen[q] = true;
                    queue.push_back(q);
                }
            }
        }

        if !touches_border && (component.len() as f64) < max_area {
            for &p in &component {
                data[[p / cols, p % cols]] = 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(size: usize, hole: std::ops::Range<usize>) -> BinaryImage {
        let mut mask = BinaryImage::new(size, size);
        for r in 1..size - 1 {
            for c in 1..size - 1 {
                let in_hole = hole.contains(&r) && hole.contains(&c);
                mask.set(r, c, u8::from(!in_hole)).unwrap();
            }
        }
        mask
    }

    #[test]
    fn test_fill_holes() {
        let mut mask = ring(10, 3..7);
        fill_holes(&mut mask);
        assert_eq!(mask.get(4, 4).unwrap(), 1);
        // Background touching the border stays
        assert_eq!(mask.get(0, 0).unwrap(), 0);
    }

    #[test]
    fn test_fill_small_holes_respects_area() {
        // Hole of 16 pixels
        let mut mask = ring(10, 3..7);
        fill_small_holes(&mut mask, 16.0);
        assert_eq!(mask.get(4, 4).unwrap(), 0);
        fill_small_holes(&mut mask, 17.0);
        assert_eq!(mask.get(4, 4).unwrap(), 1);
    }

    #[test]
    fn test_single_pixel_hole() {
        let mut mask = BinaryImage::from_vec(
            vec![
                0, 0, 0, 0, 0, //
                0, 1, 1, 1, 0, //
                0, 1, 0, 1, 0, //
                0, 1, 1, 1, 0, //
                0, 0, 0, 0, 0,
            ],
            5,
            5,
        )
        .unwrap();
        fill_small_holes(&mut mask, 2.0);
        assert_eq!(mask.get(2, 2).unwrap(), 1);
    }
}

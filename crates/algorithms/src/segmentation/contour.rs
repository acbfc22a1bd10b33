//! Outer boundary tracing
//!
//! Boundaries follow pixel edges ("cracks") rather than pixel centres, so
//! the traced polygon of a region has exactly the region's pixel area when
//! the region has no holes. Pixel `(x, y)` covers `[x, x + 1] x [y, y + 1]`.

use geo::{Coord, LineString, Polygon};

use histotile_core::LabelImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    East,
    South,
    West,
    North,
}

impl Direction {
    fn step(self) -> (i64, i64) {
        match self {
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::North => (0, -1),
        }
    }

    /// Clockwise turn in image coordinates (y down)
    fn right(self) -> Self {
        match self {
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
            Direction::North => Direction::East,
        }
    }

    fn left(self) -> Self {
        match self {
            Direction::East => Direction::North,
            Direction::South => Direction::East,
            Direction::West => Direction::South,
            Direction::North => Direction::West,
        }
    }

    /// Pixels ahead-right and ahead-left of vertex (vx, vy)
    fn ahead(self, vx: i64, vy: i64) -> ((i64, i64), (i64, i64)) {
        match self {
            Direction::East => ((vx, vy), (vx, vy - 1)),
            Direction::South => ((vx - 1, vy), (vx, vy)),
            Direction::West => ((vx - 1, vy - 1), (vx - 1, vy)),
            Direction::North => ((vx, vy - 1), (vx - 1, vy - 1)),
        }
    }
}

/// Trace the outer boundary of the 4-connected region of `label` that
/// contains the first pixel of that label in raster order.
///
/// `start` must be that first pixel as `(row, col)`. Vertices are the
/// corners of the boundary in pixel-edge coordinates, clockwise on screen.
pub fn trace_outline(labels: &LabelImage, label: u32, start: (usize, usize)) -> Polygon<f64> {
    let (rows, cols) = labels.shape();
    let data = labels.data();
    let inside = |(x, y): (i64, i64)| {
        x >= 0 && y >= 0 && (x as usize) < cols && (y as usize) < rows && data[[y as usize, x as usize]] == label
    };

    let origin = (start.1 as i64, start.0 as i64);
    let mut vertices = vec![Coord {
        x: origin.0 as f64,
        y: origin.1 as f64,
    }];
    let (mut vx, mut vy) = origin;
    let mut dir = Direction::East;
    // Every edge is walked at most once
    let max_steps = 2 * (rows + 1) * (cols + 1) + 4;

    for _ in 0..max_steps {
        let (dx, dy) = dir.step();
        vx += dx;
        vy += dy;
        if (vx, vy) == origin {
            break;
        }
        let (ahead_right, ahead_left) = dir.ahead(vx, vy);
        let next = if !inside(ahead_right) {
            dir.right()
        } else if inside(ahead_left) {
            dir.left()
        } else {
            dir
        };
        if next != dir {
            vertices.push(Coord {
                x: vx as f64,
                y: vy as f64,
            });
            dir = next;
        }
    }

    Polygon::new(LineString::from(vertices), vec![])
}

/// Outer boundary of every label `1..=label_count`.
///
/// Each label is expected to form one 4-connected region, as produced by
/// 4-connected labeling. Element `i` is the outline of label `i + 1`, or
/// `None` when the label does not occur.
pub fn region_outlines(labels: &LabelImage, label_count: usize) -> Vec<Option<Polygon<f64>>> {
    let mut first = vec![None; label_count];
    for ((row, col), &label) in labels.data().indexed_iter() {
        if label == 0 {
            continue;
        }
        if let Some(slot) = first.get_mut(label as usize - 1) {
            if slot.is_none() {
                *slot = Some((row, col));
            }
        }
    }
    first
        .into_iter()
        .enumerate()
        .map(|(i, start)| start.map(|s| trace_outline(labels, i as u32 + 1, s)))
        .collect()
}

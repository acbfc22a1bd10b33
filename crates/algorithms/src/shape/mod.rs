//! Polygon shape analysis for detected objects
//!
//! - Simplify: smooth pixel-edge outlines and reduce them (Douglas-Peucker)
//! - Measurements: area, perimeter, circularity, solidity, axes
//! - Calibration: map pixel outlines to microns

mod measurements;
mod simplify;

pub use measurements::{
    area, circularity, min_max_axis, perimeter, solidity, ShapeMeasurements,
};
pub use simplify::{
    distinct_vertex_count, edge_midpoints, scale_polygon, simplify_outline, to_image_space,
};

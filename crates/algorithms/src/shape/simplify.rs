//! Outline simplification and coordinate mapping

use geo::{Coord, LineString, MapCoords, Polygon, Simplify};

/// Simplify the exterior of a traced outline using Douglas-Peucker.
///
/// Holes are dropped; traced outlines never carry any.
pub fn simplify_outline(polygon: &Polygon<f64>, tolerance: f64) -> Polygon<f64> {
    Polygon::new(polygon.exterior().simplify(&tolerance), vec![])
}

/// Replace a pixel-edge outline by the midpoints of its unit edges.
///
/// Unit steps of a staircase collapse onto the line through their
/// midpoints, so a following Douglas-Peucker pass removes them and the
/// perimeter of the result stays close to that of the underlying shape.
/// Segments are split into `round(length)` unit edges.
pub fn edge_midpoints(polygon: &Polygon<f64>) -> Polygon<f64> {
    let mut midpoints = Vec::new();
    for line in polygon.exterior().lines() {
        let (dx, dy) = (line.end.x - line.start.x, line.end.y - line.start.y);
        let steps = dx.hypot(dy).round() as usize;
        if steps == 0 {
            continue;
        }
        let (ux, uy) = (dx / steps as f64, dy / steps as f64);
        midpoints.extend((0..steps).map(|k| {
            let t = k as f64 + 0.5;
            Coord {
                x: line.start.x + ux * t,
                y: line.start.y + uy * t,
            }
        }));
    }
    Polygon::new(LineString::from(midpoints), vec![])
}

/// Number of distinct vertices of the exterior ring
pub fn distinct_vertex_count(polygon: &Polygon<f64>) -> usize {
    let mut coords: Vec<Coord<f64>> = polygon.exterior().0.clone();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    coords.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    coords.dedup();
    coords.len()
}

/// Multiply x by `sx` and y by `sy`
pub fn scale_polygon(polygon: &Polygon<f64>, sx: f64, sy: f64) -> Polygon<f64> {
    polygon.map_coords(|c| Coord {
        x: c.x * sx,
        y: c.y * sy,
    })
}

/// Map tile pixel coordinates to full-resolution image coordinates
pub fn to_image_space(polygon: &Polygon<f64>, downsample: f64, x: f64, y: f64) -> Polygon<f64> {
    polygon.map_coords(|c| Coord {
        x: c.x * downsample + x,
        y: c.y * downsample + y,
    })
}

//! Regions of interest in full-resolution image coordinates

use geo::{Area, BoundingRect, Centroid, Contains, Coord, LineString, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Outline of a region of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoiShape {
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Polygon(Polygon<f64>),
}

/// A region of interest on one image plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    shape: RoiShape,
    z: u32,
    t: u32,
}

impl Roi {
    /// Axis-aligned rectangle on plane (0, 0)
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Result<Self> {
        if !(width > 0.0 && height > 0.0 && x.is_finite() && y.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "roi",
                value: format!("{},{},{},{}", x, y, width, height),
                reason: "rectangle must have a finite origin and positive size".to_string(),
            });
        }
        Ok(Self {
            shape: RoiShape::Rectangle {
                x,
                y,
                width,
                height,
            },
            z: 0,
            t: 0,
        })
    }

    /// Polygon on plane (0, 0); needs at least three vertices and a non-zero area
    pub fn polygon(polygon: Polygon<f64>) -> Result<Self> {
        if polygon.exterior().0.len() < 4 || polygon.unsigned_area() <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "roi",
                value: format!("{} vertices", polygon.exterior().0.len()),
                reason: "polygon must enclose a non-zero area".to_string(),
            });
        }
        Ok(Self {
            shape: RoiShape::Polygon(polygon),
            z: 0,
            t: 0,
        })
    }

    /// Polygon from a list of (x, y) vertices
    pub fn from_points(points: &[(f64, f64)]) -> Result<Self> {
        Self::polygon(Polygon::new(LineString::from(points.to_vec()), vec![]))
    }

    pub fn with_plane(mut self, z: u32, t: u32) -> Self {
        self.z = z;
        self.t = t;
        self
    }

    pub fn shape(&self) -> &RoiShape {
        &self.shape
    }

    pub fn z(&self) -> u32 {
        self.z
    }

    pub fn t(&self) -> u32 {
        self.t
    }

    pub fn is_rectangle(&self) -> bool {
        matches!(self.shape, RoiShape::Rectangle { .. })
    }

    /// Bounding rectangle
    pub fn bounds(&self) -> Rect<f64> {
        match &self.shape {
            RoiShape::Rectangle {
                x,
                y,
                width,
                height,
            } => Rect::new(
                Coord { x: *x, y: *y },
                Coord {
                    x: x + width,
                    y: y + height,
                },
            ),
            RoiShape::Polygon(p) => p.bounding_rect().unwrap_or_else(|| {
                Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.0 })
            }),
        }
    }

    /// Area-weighted centroid
    pub fn centroid(&self) -> (f64, f64) {
        match &self.shape {
            RoiShape::Rectangle {
                x,
                y,
                width,
                height,
            } => (x + width / 2.0, y + height / 2.0),
            RoiShape::Polygon(p) => match p.centroid() {
                Some(c) => (c.x(), c.y()),
                None => {
                    let b = self.bounds().center();
                    (b.x, b.y)
                }
            },
        }
    }

    pub fn area(&self) -> f64 {
        match &self.shape {
            RoiShape::Rectangle { width, height, .. } => width * height,
            RoiShape::Polygon(p) => p.unsigned_area(),
        }
    }

    /// Outline as a polygon
    pub fn to_polygon(&self) -> Polygon<f64> {
        match &self.shape {
            RoiShape::Rectangle { .. } => self.bounds().to_polygon(),
            RoiShape::Polygon(p) => p.clone(),
        }
    }

    /// Whether the point lies strictly inside the region
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        match &self.shape {
            RoiShape::Rectangle {
                x: rx,
                y: ry,
                width,
                height,
            } => x > *rx && y > *ry && x < rx + width && y < ry + height,
            RoiShape::Polygon(p) => p.contains(&Point::new(x, y)),
        }
    }

    /// Whether `polygon` lies entirely inside the region
    pub fn contains_polygon(&self, polygon: &Polygon<f64>) -> bool {
        match &self.shape {
            RoiShape::Rectangle { .. } => self.bounds().to_polygon().contains(polygon),
            RoiShape::Polygon(p) => p.contains(polygon),
        }
    }

    /// Distance from a point to the outline
    pub fn distance_to_outline(&self, x: f64, y: f64) -> f64 {
        let polygon = self.to_polygon();
        let mut best = f64::INFINITY;
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            for line in ring.lines() {
                best = best.min(point_segment_distance(x, y, line.start, line.end));
            }
        }
        best
    }
}

fn point_segment_distance(x: f64, y: f64, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (((x - a.x) * dx + (y - a.y) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let px = a.x + t * dx - x;
    let py = a.y + t * dy - y;
    (px * px + py * py).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Roi {
        Roi::from_points(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]).unwrap()
    }

    #[test]
    fn test_rectangle_geometry() {
        let roi = Roi::rectangle(10.0, 20.0, 30.0, 40.0).unwrap();
        assert!(roi.is_rectangle());
        assert_eq!(roi.centroid(), (25.0, 40.0));
        assert_eq!(roi.area(), 1200.0);
        let b = roi.bounds();
        assert_eq!((b.min().x, b.min().y, b.width(), b.height()), (10.0, 20.0, 30.0, 40.0));
        assert!(roi.contains_point(11.0, 21.0));
        assert!(!roi.contains_point(41.0, 21.0));
    }

    #[test]
    fn test_polygon_containment() {
        let roi = triangle();
        assert!(!roi.is_rectangle());
        assert!(roi.contains_point(2.0, 2.0));
        assert!(!roi.contains_point(8.0, 8.0));
        let inner = Polygon::new(
            LineString::from(vec![(1.0, 1.0), (3.0, 1.0), (1.0, 3.0)]),
            vec![],
        );
        let outer = Polygon::new(
            LineString::from(vec![(5.0, 5.0), (9.0, 5.0), (5.0, 9.0)]),
            vec![],
        );
        assert!(roi.contains_polygon(&inner));
        assert!(!roi.contains_polygon(&outer));
    }

    #[test]
    fn test_distance_to_outline() {
        let roi = Roi::rectangle(0.0, 0.0, 10.0, 10.0).unwrap();
        assert!((roi.distance_to_outline(5.0, 1.0) - 1.0).abs() < 1e-12);
        assert!((roi.distance_to_outline(5.0, 5.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_rois_rejected() {
        assert!(Roi::rectangle(0.0, 0.0, 0.0, 5.0).is_err());
        assert!(Roi::from_points(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]).is_err());
    }
}

//! Geometric measurements: area, perimeter, circularity, solidity, axes

use geo::{Area as GeoArea, ConvexHull, Euclidean, Length, MinimumRotatedRect, Polygon};

use histotile_core::{MeasurementList, PixelCalibration, Result};

use super::simplify::scale_polygon;

/// Unsigned area of a polygon, holes excluded
pub fn area(polygon: &Polygon<f64>) -> f64 {
    polygon.unsigned_area()
}

/// Total length of exterior and interior rings
pub fn perimeter(polygon: &Polygon<f64>) -> f64 {
    let ext = polygon.exterior().length::<Euclidean>();
    let int: f64 = polygon
        .interiors()
        .iter()
        .map(|r| r.length::<Euclidean>())
        .sum();
    ext + int
}

/// `4πA / P²`, capped at 1; 0 for a degenerate polygon
pub fn circularity(polygon: &Polygon<f64>) -> f64 {
    let p = perimeter(polygon);
    if p <= 0.0 {
        return 0.0;
    }
    (4.0 * std::f64::consts::PI * area(polygon) / (p * p)).min(1.0)
}

/// Area divided by convex hull area
pub fn solidity(polygon: &Polygon<f64>) -> f64 {
    let hull = polygon.convex_hull().unsigned_area();
    if hull <= 0.0 {
        return f64::NAN;
    }
    area(polygon) / hull
}

/// Side lengths of the minimum-area bounding rectangle, shortest first
pub fn min_max_axis(polygon: &Polygon<f64>) -> (f64, f64) {
    let Some(rect) = polygon.minimum_rotated_rect() else {
        return (0.0, 0.0);
    };
    let c = &rect.exterior().0;
    if c.len() < 3 {
        return (0.0, 0.0);
    }
    let side = |a: usize, b: usize| ((c[b].x - c[a].x).powi(2) + (c[b].y - c[a].y).powi(2)).sqrt();
    let (s1, s2) = (side(0, 1), side(1, 2));
    (s1.min(s2), s1.max(s2))
}

/// Shape descriptors of one object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeMeasurements {
    pub area: f64,
    pub perimeter: f64,
    pub circularity: f64,
    pub solidity: f64,
    pub min_axis: f64,
    pub max_axis: f64,
}

impl ShapeMeasurements {
    /// Measure a polygon given in full-resolution pixel coordinates.
    ///
    /// With a micron calibration the polygon is scaled first, so lengths are
    /// in µm and areas in µm²; otherwise everything is in pixels.
    pub fn measure(polygon: &Polygon<f64>, calibration: &PixelCalibration) -> Self {
        let scaled;
        let polygon = match (
            calibration.pixel_width_microns(),
            calibration.pixel_height_microns(),
        ) {
            (Some(pw), Some(ph)) => {
                scaled = scale_polygon(polygon, pw, ph);
                &scaled
            }
            _ => polygon,
        };
        let (min_axis, max_axis) = min_max_axis(polygon);
        Self {
            area: area(polygon),
            perimeter: perimeter(polygon),
            circularity: circularity(polygon),
            solidity: solidity(polygon),
            min_axis,
            max_axis,
        }
    }

    /// Append `Area`, `Perimeter`, `Circularity`, `Solidity`, `Min axis`, `Max axis`
    pub fn write_to(&self, list: &mut MeasurementList) -> Result<()> {
        list.put("Area", self.area)?;
        list.put("Perimeter", self.perimeter)?;
        list.put("Circularity", self.circularity)?;
        list.put("Solidity", self.solidity)?;
        list.put("Min axis", self.min_axis)?;
        list.put("Max axis", self.max_axis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::LineString;

    fn rect(w: f64, h: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(0.0, 0.0), (w, 0.0), (w, h), (0.0, h), (0.0, 0.0)]),
            vec![],
        )
    }

    #[test]
    fn test_rectangle_measurements() {
        let r = rect(10.0, 4.0);
        assert_relative_eq!(area(&r), 40.0);
        assert_relative_eq!(perimeter(&r), 28.0);
        assert_relative_eq!(solidity(&r), 1.0);
        let (min, max) = min_max_axis(&r);
        assert_relative_eq!(min, 4.0, epsilon = 1e-9);
        assert_relative_eq!(max, 10.0, epsilon = 1e-9);
        assert_relative_eq!(circularity(&r), 4.0 * std::f64::consts::PI * 40.0 / 784.0);
    }

    #[test]
    fn test_concave_solidity() {
        // Three unit squares; the hull cuts the missing corner diagonally
        let l = Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (1.0, 0.0),
                (1.0, 1.0),
                (2.0, 1.0),
                (2.0, 2.0),
                (0.0, 2.0),
                (0.0, 0.0),
            ]),
            vec![],
        );
        assert_relative_eq!(solidity(&l), 3.0 / 3.5);
    }

    #[test]
    fn test_circularity_is_capped() {
        let n = 256;
        let ring: Vec<(f64, f64)> = (0..=n)
            .map(|i| {
                let a = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                (10.0 * a.cos(), 10.0 * a.sin())
            })
            .collect();
        let circle = Polygon::new(LineString::from(ring), vec![]);
        let c = circularity(&circle);
        assert!(c > 0.99 && c <= 1.0);
    }

    #[test]
    fn test_calibrated_measurement() {
        let cal = PixelCalibration::microns(0.5, 0.5).unwrap();
        let m = ShapeMeasurements::measure(&rect(10.0, 4.0), &cal);
        assert_relative_eq!(m.area, 10.0);
        assert_relative_eq!(m.perimeter, 14.0);
        assert_relative_eq!(m.max_axis, 5.0, epsilon = 1e-9);

        let mut list = MeasurementList::new();
        m.write_to(&mut list).unwrap();
        let names: Vec<&str> = list.names().collect();
        assert_eq!(
            names,
            vec!["Area", "Perimeter", "Circularity", "Solidity", "Min axis", "Max axis"]
        );
    }
}

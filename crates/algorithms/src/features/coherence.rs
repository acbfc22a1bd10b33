//! Structure tensor coherence
//!
//! The structure tensor averages the outer product of the image gradient
//! over a tile. Its eigenvalues describe how strongly gradients agree on a
//! single orientation: coherence is 1 for a pure one-directional ramp and 0
//! when gradients show no preferred orientation.

use histotile_core::ScalarImage;

/// Averaged gradient outer products `[[jxx, jxy], [jxy, jyy]]`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StructureTensor {
    pub jxx: f64,
    pub jyy: f64,
    pub jxy: f64,
}

impl StructureTensor {
    /// Accumulate central differences over interior pixels.
    ///
    /// Each term is scaled by `1 / ((w - 2)(h - 2))`. Pixels whose x or y
    /// difference is NaN are skipped. Returns `None` for images smaller
    /// than 3x3.
    pub fn from_image(image: &ScalarImage) -> Option<Self> {
        let (rows, cols) = image.shape();
        if rows < 3 || cols < 3 {
            return None;
        }
        let data = image.data();
        let scale = 1.0 / ((cols - 2) as f64 * (rows - 2) as f64);

        let mut tensor = Self::default();
        for y in 1..rows - 1 {
            for x in 1..cols - 1 {
                let dx = (data[[y, x + 1]] as f64 - data[[y, x - 1]] as f64) / 2.0;
                let dy = (data[[y + 1, x]] as f64 - data[[y - 1, x]] as f64) / 2.0;
                if dx.is_nan() || dy.is_nan() {
                    continue;
                }
                tensor.jxx += scale * dx * dx;
                tensor.jyy += scale * dy * dy;
                tensor.jxy += scale * dx * dy;
            }
        }
        Some(tensor)
    }

    /// Eigenvalues, largest first
    pub fn eigenvalues(&self) -> (f64, f64) {
        let trace = self.jxx + self.jyy;
        let det = self.jxx * self.jyy - self.jxy * self.jxy;
        // Rounding can push the discriminant of a near-isotropic tensor below zero
        let root = (trace * trace / 4.0 - det).max(0.0).sqrt();
        (trace / 2.0 + root, trace / 2.0 - root)
    }

    /// `((l1 - l2) / (l1 + l2))^2`, or 0 when both eigenvalues are equal
    pub fn coherence(&self) -> f64 {
        let (l1, l2) = self.eigenvalues();
        if l1 == l2 {
            return 0.0;
        }
        let c = (l1 - l2) / (l1 + l2);
        c * c
    }
}

/// Coherence of the structure tensor of `image`; NaN for images below 3x3
pub fn coherence(image: &ScalarImage) -> f64 {
    StructureTensor::from_image(image)
        .map(|t| t.coherence())
        .unwrap_or(f64::NAN)
}

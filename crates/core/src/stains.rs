//! Stain vectors for color deconvolution
//!
//! A stain is described by its optical density (OD) response in the red,
//! green and blue channels. Up to three stains form a `StainSet`; the
//! inverse of the stain matrix is computed once at construction and reused
//! for every pixel.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A named stain with a unit-length optical density vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StainVector {
    name: String,
    od: [f64; 3],
    residual: bool,
}

impl StainVector {
    /// Create a stain from its red, green and blue OD response
    pub fn new(name: impl Into<String>, r: f64, g: f64, b: f64) -> Result<Self> {
        let name = name.into();
        let od = normalize([r, g, b]).ok_or_else(|| {
            Error::InvalidStains(format!(
                "stain '{}' has a zero or non-finite vector ({}, {}, {})",
                name, r, g, b
            ))
        })?;
        Ok(Self {
            name,
            od,
            residual: false,
        })
    }

    /// Residual stain orthogonal to `first` and `second`
    pub fn residual(first: &StainVector, second: &StainVector) -> Result<Self> {
        let [a1, a2, a3] = first.od;
        let [b1, b2, b3] = second.od;
        let cross = [a2 * b3 - a3 * b2, a3 * b1 - a1 * b3, a1 * b2 - a2 * b1];
        let od = normalize(cross).ok_or_else(|| {
            Error::InvalidStains(format!(
                "stains '{}' and '{}' are parallel",
                first.name, second.name
            ))
        })?;
        Ok(Self {
            name: "Residual".to_string(),
            od,
            residual: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized (red, green, blue) optical density
    pub fn od(&self) -> [f64; 3] {
        self.od
    }

    pub fn is_residual(&self) -> bool {
        self.residual
    }
}

fn normalize(v: [f64; 3]) -> Option<[f64; 3]> {
    let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if !norm.is_finite() || norm <= f64::EPSILON {
        return None;
    }
    Some([v[0] / norm, v[1] / norm, v[2] / norm])
}

/// Which stain combination a set describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StainKind {
    /// Hematoxylin and DAB
    HDab,
    /// Hematoxylin and eosin
    HEosin,
    /// Any other combination
    Other,
}

/// Up to three stains plus the inverse stain matrix used for deconvolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StainSet {
    name: String,
    kind: StainKind,
    stains: [StainVector; 3],
    background: [f64; 3],
    inverse: [[f64; 3]; 3],
}

impl StainSet {
    /// Build a stain set; the third stain defaults to the residual of the first two.
    ///
    /// Fails when the resulting 3x3 stain matrix cannot be inverted.
    pub fn new(
        name: impl Into<String>,
        kind: StainKind,
        stain1: StainVector,
        stain2: StainVector,
        stain3: Option<StainVector>,
    ) -> Result<Self> {
        let stain3 = match stain3 {
            Some(s) => s,
            None => StainVector::residual(&stain1, &stain2)?,
        };
        let matrix = [stain1.od, stain2.od, stain3.od];
        let inverse = invert_3x3(&matrix)
            .ok_or_else(|| Error::InvalidStains("stain matrix is singular".to_string()))?;
        Ok(Self {
            name: name.into(),
            kind,
            stains: [stain1, stain2, stain3],
            background: [255.0; 3],
            inverse,
        })
    }

    /// Default hematoxylin / DAB vectors
    pub fn h_dab() -> Result<Self> {
        Self::new(
            "H-DAB default",
            StainKind::HDab,
            StainVector::new("Hematoxylin", 0.651, 0.701, 0.290)?,
            StainVector::new("DAB", 0.269, 0.568, 0.778)?,
            None,
        )
    }

    /// Default hematoxylin / eosin vectors
    pub fn h_e() -> Result<Self> {
        Self::new(
            "H&E default",
            StainKind::HEosin,
            StainVector::new("Hematoxylin", 0.651, 0.701, 0.290)?,
            StainVector::new("Eosin", 0.216, 0.801, 0.558)?,
            None,
        )
    }

    /// Set the per-channel background (white) intensity, 255 by default
    pub fn with_background(mut self, red: f64, green: f64, blue: f64) -> Result<Self> {
        for (name, value) in [("background_red", red), ("background_green", green), ("background_blue", blue)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidParameter {
                    name,
                    value: value.to_string(),
                    reason: "background intensity must be positive".to_string(),
                });
            }
        }
        self.background = [red, green, blue];
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StainKind {
        self.kind
    }

    /// Stain by zero-based index (0..3)
    pub fn stain(&self, index: usize) -> Option<&StainVector> {
        self.stains.get(index)
    }

    /// Per-channel background intensity
    pub fn background(&self) -> [f64; 3] {
        self.background
    }

    /// Inverse of the matrix whose rows are the stain OD vectors
    pub fn inverse(&self) -> &[[f64; 3]; 3] {
        &self.inverse
    }

    pub fn is_h_dab(&self) -> bool {
        self.kind == StainKind::HDab
    }

    pub fn is_h_e(&self) -> bool {
        self.kind == StainKind::HEosin
    }
}

fn invert_3x3(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    if !det.is_finite() || det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ])
}

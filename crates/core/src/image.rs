//! Whole-image metadata shared by all region reads

use serde::{Deserialize, Serialize};

use crate::calibration::PixelCalibration;
use crate::error::{Error, Result};
use crate::stains::StainSet;

/// Size, calibration and stain information for a full-resolution image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: usize,
    pub height: usize,
    pub calibration: PixelCalibration,
    /// Objective magnification of the full-resolution image, when known
    pub magnification: Option<f64>,
    pub stains: Option<StainSet>,
}

impl ImageMetadata {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            calibration: PixelCalibration::uncalibrated(),
            magnification: None,
            stains: None,
        })
    }

    pub fn with_calibration(mut self, calibration: PixelCalibration) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_magnification(mut self, magnification: Option<f64>) -> Self {
        self.magnification = magnification.filter(|m| m.is_finite() && *m > 0.0);
        self
    }

    pub fn with_stains(mut self, stains: Option<StainSet>) -> Self {
        self.stains = stains;
        self
    }

    /// Downsample needed to view the image at `target` magnification.
    ///
    /// Images with unknown magnification are processed at full resolution.
    pub fn downsample_for_magnification(&self, target: f64) -> f64 {
        match self.magnification {
            Some(full) if target > 0.0 => full / target,
            _ => 1.0,
        }
    }
}

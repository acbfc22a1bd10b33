//! Pixel calibration and conversion between physical and pixel units
//!
//! Whole slide images usually carry a pixel size in microns. Parameters
//! such as a tile diameter or a smoothing sigma are therefore configured
//! twice: once in microns (used when the image is calibrated) and once in
//! full-resolution pixels (the fallback for uncalibrated images).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Physical size of one pixel, in microns
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelCalibration {
    pixel_width_microns: Option<f64>,
    pixel_height_microns: Option<f64>,
}

impl PixelCalibration {
    /// Calibration for an image without physical pixel sizes
    pub fn uncalibrated() -> Self {
        Self::default()
    }

    /// Calibration with pixel width and height in microns
    pub fn microns(pixel_width: f64, pixel_height: f64) -> Result<Self> {
        for (name, value) in [("pixel_width", pixel_width), ("pixel_height", pixel_height)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidParameter {
                    name,
                    value: value.to_string(),
                    reason: "pixel size must be finite and positive".to_string(),
                });
            }
        }
        Ok(Self {
            pixel_width_microns: Some(pixel_width),
            pixel_height_microns: Some(pixel_height),
        })
    }

    /// Whether both pixel width and height are known in microns
    pub fn has_microns(&self) -> bool {
        self.pixel_width_microns.is_some() && self.pixel_height_microns.is_some()
    }

    /// Pixel width in microns
    pub fn pixel_width_microns(&self) -> Option<f64> {
        self.pixel_width_microns.filter(|_| self.has_microns())
    }

    /// Pixel height in microns
    pub fn pixel_height_microns(&self) -> Option<f64> {
        self.pixel_height_microns.filter(|_| self.has_microns())
    }

    /// Mean of pixel width and height in microns
    pub fn average_pixel_size_microns(&self) -> Option<f64> {
        match (self.pixel_width_microns, self.pixel_height_microns) {
            (Some(w), Some(h)) => Some(0.5 * (w + h)),
            _ => None,
        }
    }

    /// Calibration of the same image read at `downsample`
    pub fn scaled(&self, downsample: f64) -> Self {
        Self {
            pixel_width_microns: self.pixel_width_microns.map(|w| w * downsample),
            pixel_height_microns: self.pixel_height_microns.map(|h| h * downsample),
        }
    }
}

/// A length given both in microns and as a full-resolution pixel fallback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalLength {
    pub microns: f64,
    pub pixels: f64,
}

impl PhysicalLength {
    pub fn new(microns: f64, pixels: f64) -> Self {
        Self { microns, pixels }
    }

    /// Check both values are finite and not negative
    pub fn validate(&self, name: &'static str) -> Result<()> {
        validate_non_negative(name, self.microns)?;
        validate_non_negative(name, self.pixels)
    }
}

/// An area given both in square microns and as a full-resolution pixel fallback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalArea {
    pub square_microns: f64,
    pub pixels: f64,
}

impl PhysicalArea {
    pub fn new(square_microns: f64, pixels: f64) -> Self {
        Self {
            square_microns,
            pixels,
        }
    }

    /// Check both values are finite and not negative
    pub fn validate(&self, name: &'static str) -> Result<()> {
        validate_non_negative(name, self.square_microns)?;
        validate_non_negative(name, self.pixels)
    }
}

fn validate_non_negative(name: &'static str, value: f64) -> Result<()> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: "must be finite and not negative".to_string(),
        });
    }
    Ok(())
}

/// Size of a square tile in full-resolution pixels, with its display label
#[derive(Debug, Clone, PartialEq)]
pub struct TileExtent {
    pub width: usize,
    pub height: usize,
    /// Diameter as shown in measurement names, e.g. `25.0 µm` or `200 px`
    pub label: String,
}

/// Converts physical parameters to pixel sizes for an image read at a downsample.
///
/// All conversions select the micron branch when the full-resolution
/// calibration is known and silently fall back to the pixel branch otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConverter {
    calibration: PixelCalibration,
    downsample: f64,
}

impl UnitConverter {
    /// Create a converter for a full-resolution `calibration` read at `downsample`
    pub fn new(calibration: PixelCalibration, downsample: f64) -> Result<Self> {
        if !(downsample.is_finite() && downsample > 0.0) {
            return Err(Error::InvalidParameter {
                name: "downsample",
                value: downsample.to_string(),
                reason: "downsample must be finite and positive".to_string(),
            });
        }
        Ok(Self {
            calibration,
            downsample,
        })
    }

    pub fn downsample(&self) -> f64 {
        self.downsample
    }

    pub fn calibration(&self) -> &PixelCalibration {
        &self.calibration
    }

    pub fn has_microns(&self) -> bool {
        self.calibration.has_microns()
    }

    /// Average pixel size in microns at the working downsample
    pub fn pixel_size_microns(&self) -> Option<f64> {
        self.calibration
            .average_pixel_size_microns()
            .map(|size| size * self.downsample)
    }

    /// Tile size in full-resolution pixels for a tile `diameter`.
    ///
    /// Width and height are rounded independently (`floor(v + 0.5)`), so
    /// anisotropic pixels give rectangular tiles.
    pub fn tile_extent(&self, diameter: &PhysicalLength) -> TileExtent {
        match (
            self.calibration.pixel_width_microns(),
            self.calibration.pixel_height_microns(),
        ) {
            (Some(pw), Some(ph)) => TileExtent {
                width: round_half_up(diameter.microns / pw),
                height: round_half_up(diameter.microns / ph),
                label: format!("{:.1} µm", diameter.microns),
            },
            _ => {
                let size = round_half_up(diameter.pixels);
                TileExtent {
                    width: size,
                    height: size,
                    label: format!("{} px", size),
                }
            }
        }
    }

    /// Length in pixels at the working downsample
    pub fn length_to_pixels(&self, length: &PhysicalLength) -> f64 {
        match self.pixel_size_microns() {
            Some(size) => length.microns / size,
            None => length.pixels / self.downsample,
        }
    }

    /// Length rounded to whole pixels at the working downsample, e.g. a filter radius
    pub fn radius_to_pixels(&self, length: &PhysicalLength) -> usize {
        round_half_up(self.length_to_pixels(length))
    }

    /// Area in pixels at the working downsample
    pub fn area_to_pixels(&self, area: &PhysicalArea) -> f64 {
        match self.pixel_size_microns() {
            Some(size) => area.square_microns / (size * size),
            None => area.pixels / (self.downsample * self.downsample),
        }
    }
}

/// `floor(value + 0.5)` clamped at zero
pub fn round_half_up(value: f64) -> usize {
    let rounded = (value + 0.5).floor();
    if rounded.is_finite() && rounded > 0.0 {
        rounded as usize
    } else {
        0
    }
}

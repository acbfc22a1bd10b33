//! Per-pixel color transforms
//!
//! Every transform maps one packed `0x00RRGGBB` pixel to one scalar value
//! without looking at other pixels, so whole tiles are transformed row by
//! row in parallel.

use histotile_core::raster::rgb;
use histotile_core::{Error, Result, RgbImage, ScalarImage, StainSet};
use serde::{Deserialize, Serialize};

use crate::maybe_rayon::*;

/// Optical density mapped to 255 by the 8-bit stain transforms
pub const OD_8BIT_MAX: f64 = 2.5;

/// How a packed RGB pixel becomes a scalar value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorTransformMethod {
    /// Sum of red, green and blue optical densities
    OpticalDensitySum,
    /// Amount of stain `index` (0..3) of a stain set, in optical density units
    Deconvolved { index: usize },
    /// Like `Deconvolved`, linearly mapped from OD `[0, 2.5]` to `[0, 255]`
    Deconvolved8Bit { index: usize },
    Red,
    Green,
    Blue,
    /// Mean of red, green and blue
    Grayscale,
}

impl ColorTransformMethod {
    /// Whether the method needs a stain set
    pub fn requires_stains(&self) -> bool {
        matches!(
            self,
            ColorTransformMethod::Deconvolved { .. } | ColorTransformMethod::Deconvolved8Bit { .. }
        )
    }
}

/// A color transform bound to its stain set and channel name
#[derive(Debug, Clone)]
pub struct ColorTransformer {
    method: ColorTransformMethod,
    name: String,
    /// Optical density of each 8-bit value for the red, green and blue channels
    od_lut: [[f64; 256]; 3],
    /// Column of the inverse stain matrix for the selected stain
    weights: [f64; 3],
}

impl ColorTransformer {
    /// Bind `method` to `stains`.
    ///
    /// Deconvolution methods fail with `InvalidStains` when no stain set is
    /// given or the stain index is out of range; the other methods ignore
    /// the stains except for the background used by optical densities.
    pub fn new(method: ColorTransformMethod, stains: Option<&StainSet>) -> Result<Self> {
        let background = stains.map(|s| s.background()).unwrap_or([255.0; 3]);
        let mut od_lut = [[0.0; 256]; 3];
        for (channel, lut) in od_lut.iter_mut().enumerate() {
            for (v, od) in lut.iter_mut().enumerate() {
                *od = optical_density(v as f64, background[channel]);
            }
        }

        let (name, weights) = match method {
            ColorTransformMethod::OpticalDensitySum => ("OD sum".to_string(), [1.0; 3]),
            ColorTransformMethod::Deconvolved { index }
            | ColorTransformMethod::Deconvolved8Bit { index } => {
                let stains = stains.ok_or_else(|| {
                    Error::InvalidStains("color deconvolution requires a stain set".to_string())
                })?;
                let stain = stains.stain(index).ok_or_else(|| {
                    Error::InvalidStains(format!("stain index {} out of range", index))
                })?;
                let inv = stains.inverse();
                let weights = [inv[0][index], inv[1][index], inv[2][index]];
                let name = if matches!(method, ColorTransformMethod::Deconvolved8Bit { .. }) {
                    format!("{} 8-bit", stain.name())
                } else {
                    stain.name().to_string()
                };
                (name, weights)
            }
            ColorTransformMethod::Red => ("Red".to_string(), [1.0, 0.0, 0.0]),
            ColorTransformMethod::Green => ("Green".to_string(), [0.0, 1.0, 0.0]),
            ColorTransformMethod::Blue => ("Blue".to_string(), [0.0, 0.0, 1.0]),
            ColorTransformMethod::Grayscale => ("Grayscale".to_string(), [1.0 / 3.0; 3]),
        };

        Ok(Self {
            method,
            name,
            od_lut,
            weights,
        })
    }

    pub fn method(&self) -> ColorTransformMethod {
        self.method
    }

    /// Channel name used in measurement names, e.g. `Hematoxylin` or `OD sum`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transform one packed RGB pixel
    #[inline]
    pub fn apply(&self, pixel: u32) -> f32 {
        let (r, g, b) = (rgb::red(pixel), rgb::green(pixel), rgb::blue(pixel));
        match self.method {
            ColorTransformMethod::Red => r as f32,
            ColorTransformMethod::Green => g as f32,
            ColorTransformMethod::Blue => b as f32,
            ColorTransformMethod::Grayscale => (r as f32 + g as f32 + b as f32) / 3.0,
            ColorTransformMethod::OpticalDensitySum => {
                (self.od_lut[0][r as usize] + self.od_lut[1][g as usize] + self.od_lut[2][b as usize])
                    as f32
            }
            ColorTransformMethod::Deconvolved { .. } => self.deconvolve(r, g, b) as f32,
            ColorTransformMethod::Deconvolved8Bit { .. } => {
                let v = self.deconvolve(r, g, b) / OD_8BIT_MAX * 255.0;
                v.round().clamp(0.0, 255.0) as f32
            }
        }
    }

    #[inline]
    fn deconvolve(&self, r: u8, g: u8, b: u8) -> f64 {
        self.od_lut[0][r as usize] * self.weights[0]
            + self.od_lut[1][g as usize] * self.weights[1]
            + self.od_lut[2][b as usize] * self.weights[2]
    }

    /// Transform a whole tile, keeping its calibration
    pub fn transform(&self, image: &RgbImage) -> Result<ScalarImage> {
        let (rows, cols) = image.shape();
        let pixels = image.data();
        let data: Vec<f32> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                (0..cols)
                    .map(|col| self.apply(pixels[[row, col]]))
                    .collect::<Vec<_>>()
            })
            .collect();
        image.with_data(data)
    }
}

/// `-log10(max(v, 1) / background)`
fn optical_density(value: f64, background: f64) -> f64 {
    -(value.max(1.0) / background).log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_raw_channels_and_grayscale() {
        let p = rgb::pack(30, 60, 120);
        let t = |m| ColorTransformer::new(m, None).unwrap().apply(p);
        assert_eq!(t(ColorTransformMethod::Red), 30.0);
        assert_eq!(t(ColorTransformMethod::Green), 60.0);
        assert_eq!(t(ColorTransformMethod::Blue), 120.0);
        assert_abs_diff_eq!(t(ColorTransformMethod::Grayscale), 70.0, epsilon = 1e-5);
    }

    #[test]
    fn test_optical_density_sum() {
        let od = ColorTransformer::new(ColorTransformMethod::OpticalDensitySum, None).unwrap();
        assert_eq!(od.name(), "OD sum");
        assert_abs_diff_eq!(od.apply(rgb::gray(255)), 0.0, epsilon = 1e-7);
        // 25.5 is not representable; 51 = 255 / 5
        let expected = 3.0 * (5.0f64).log10();
        assert_abs_diff_eq!(od.apply(rgb::gray(51)) as f64, expected, epsilon = 1e-5);
        // Zero is clamped to 1 so the density stays finite
        assert!(od.apply(rgb::gray(0)).is_finite());
    }

    #[test]
    fn test_deconvolution_recovers_pure_stain() {
        let stains = StainSet::h_dab().unwrap();
        let h = ColorTransformer::new(ColorTransformMethod::Deconvolved { index: 0 }, Some(&stains)).unwrap();
        let dab = ColorTransformer::new(ColorTransformMethod::Deconvolved { index: 1 }, Some(&stains)).unwrap();
        assert_eq!(h.name(), "Hematoxylin");
        assert_eq!(dab.name(), "DAB");

        // Pixel made of hematoxylin only, with an OD of 0.5 along the stain vector
        let v = stains.stain(0).unwrap().od();
        let channel = |od: f64| (255.0 * 10f64.powf(-0.5 * od)).round() as u8;
        let pixel = rgb::pack(channel(v[0]), channel(v[1]), channel(v[2]));
        assert_abs_diff_eq!(h.apply(pixel) as f64, 0.5, epsilon = 0.02);
        assert_abs_diff_eq!(dab.apply(pixel) as f64, 0.0, epsilon = 0.02);
    }

    #[test]
    fn test_eight_bit_variant() {
        let stains = StainSet::h_e().unwrap();
        let t = ColorTransformer::new(ColorTransformMethod::Deconvolved8Bit { index: 1 }, Some(&stains)).unwrap();
        assert_eq!(t.name(), "Eosin 8-bit");
        let v = t.apply(rgb::pack(200, 40, 120));
        assert!((0.0..=255.0).contains(&v));
        assert_eq!(v, v.round());
        assert_eq!(t.apply(rgb::gray(255)), 0.0);
    }

    #[test]
    fn test_deconvolution_requires_stains() {
        assert!(ColorTransformer::new(ColorTransformMethod::Deconvolved { index: 0 }, None).is_err());
        let stains = StainSet::h_dab().unwrap();
        assert!(ColorTransformer::new(ColorTransformMethod::Deconvolved { index: 3 }, Some(&stains)).is_err());
    }

    #[test]
    fn test_transform_image() {
        let image = RgbImage::from_vec(vec![rgb::gray(10), rgb::gray(20), rgb::gray(30), rgb::gray(40)], 2, 2).unwrap();
        let t = ColorTransformer::new(ColorTransformMethod::Grayscale, None).unwrap();
        let out = t.transform(&image).unwrap();
        assert_eq!(out.shape(), (2, 2));
        assert_abs_diff_eq!(out.get(1, 0).unwrap(), 30.0, epsilon = 1e-5);
    }
}

//! Difference-of-Gaussians superpixels
//!
//! The RGB mean of a region is smoothed at two scales; the absolute
//! difference responds to blob-like structure of roughly the smaller scale.
//! Maxima of the response seed a watershed whose regions become tiles.

use geo::{Coord, Rect};
use histotile_core::raster::Connectivity;
use histotile_core::{
    Error, LabelImage, ObjectKind, PathObject, PhysicalLength, RegionContext, RegionRequest, Result,
    RgbImage, Roi, ScalarImage, UnitConverter,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bounds_request;
use crate::color::{ColorTransformMethod, ColorTransformer};
use crate::filters::gaussian_blur;
use crate::morphology::{dilate, StructuringElement};
use crate::segmentation::{
    find_maxima, label_regions, region_outlines, watershed, WatershedParams,
};
use crate::shape::to_image_space;
use crate::statistics::label_statistics;

/// Ratio of the larger to the smaller Gaussian sigma
const DOG_SIGMA_RATIO: f64 = 1.6;

/// Parameters for DoG superpixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DogSuperpixelParams {
    /// Downsample the region is read at
    pub downsample: f64,
    /// Smaller Gaussian sigma; the pixel value is in full-resolution pixels
    pub sigma: PhysicalLength,
    /// Regions with a mean intensity below this are discarded
    pub min_threshold: f64,
    /// Regions with a mean intensity above this are discarded
    pub max_threshold: f64,
    /// Noise tolerance of the seed maxima
    pub noise_threshold: f64,
}

impl Default for DogSuperpixelParams {
    fn default() -> Self {
        Self {
            downsample: 8.0,
            sigma: PhysicalLength::new(10.0, 10.0),
            min_threshold: 10.0,
            max_threshold: 230.0,
            noise_threshold: 1.0,
        }
    }
}

impl DogSuperpixelParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.downsample.is_finite() && self.downsample > 0.0) {
            return Err(Error::InvalidParameter {
                name: "downsample",
                value: self.downsample.to_string(),
                reason: "downsample must be finite and positive".to_string(),
            });
        }
        self.sigma.validate("sigma")?;
        if self.sigma.microns <= 0.0 || self.sigma.pixels <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "sigma",
                value: format!("{} µm / {} px", self.sigma.microns, self.sigma.pixels),
                reason: "sigma must be positive".to_string(),
            });
        }
        if !(self.noise_threshold.is_finite() && self.noise_threshold >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "noise_threshold",
                value: self.noise_threshold.to_string(),
                reason: "noise threshold must be finite and not negative".to_string(),
            });
        }
        Ok(())
    }

    /// Intensity range a region mean must fall in, or `None` when regions
    /// are not filtered.
    ///
    /// A non-finite bound is open. Filtering is off when the bounds are
    /// equal or both open.
    pub fn intensity_range(&self) -> Option<(f64, f64)> {
        let min = if self.min_threshold.is_finite() { self.min_threshold } else { f64::NEG_INFINITY };
        let max = if self.max_threshold.is_finite() { self.max_threshold } else { f64::INFINITY };
        let enabled = min != max && (min.is_finite() || max.is_finite());
        enabled.then_some((min, max))
    }
}

/// Splits regions into DoG superpixel tiles
#[derive(Debug, Clone)]
pub struct DogSuperpixelSegmenter {
    params: DogSuperpixelParams,
    intensity: ColorTransformer,
}

impl DogSuperpixelSegmenter {
    pub fn new(params: DogSuperpixelParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            intensity: ColorTransformer::new(ColorTransformMethod::Grayscale, None)?,
        })
    }

    pub fn params(&self) -> &DogSuperpixelParams {
        &self.params
    }

    /// Segment the whole of `roi`.
    ///
    /// Returns `Ok(None)` when there is no ROI or the region is smaller
    /// than one pixel at the working downsample.
    pub fn segment(&self, ctx: &RegionContext<'_>, roi: Option<&Roi>) -> Result<Option<Vec<PathObject>>> {
        let Some(roi) = roi else {
            debug!("No ROI, nothing to segment");
            return Ok(None);
        };
        self.segment_within(ctx, roi, roi.bounds())
    }

    /// Segment the part of `roi` inside `bounds`, e.g. one tile of a large ROI
    pub fn segment_within(
        &self,
        ctx: &RegionContext<'_>,
        roi: &Roi,
        bounds: Rect<f64>,
    ) -> Result<Option<Vec<PathObject>>> {
        let _subscription = ctx.subscribe();
        let ds = self.params.downsample;
        let Some(request) = bounds_request(ctx, roi, bounds, ds)? else {
            return Ok(None);
        };

        let tile = ctx.fetch(&request)?;
        let converter = UnitConverter::new(ctx.metadata().calibration, ds)?;
        let objects = self.segment_tile(&tile, &request, roi, &converter)?;
        ctx.cancel.check()?;
        Ok(Some(objects))
    }

    /// Segment a tile read for `request`; object outlines are returned in
    /// full-resolution image coordinates.
    pub fn segment_tile(
        &self,
        tile: &RgbImage,
        request: &RegionRequest,
        roi: &Roi,
        converter: &UnitConverter,
    ) -> Result<Vec<PathObject>> {
        let intensity = self.intensity.transform(tile)?;
        let sigma = converter.length_to_pixels(&self.params.sigma);
        let response = dog_response(&intensity, sigma)?;

        let (markers, seeds) = find_maxima(&response, self.params.noise_threshold, None)?;
        if seeds == 0 {
            return Ok(Vec::new());
        }
        let flooded = watershed(&response, &markers, None, &WatershedParams::default())?;
        let mut labels = dilate(&flooded, &StructuringElement::Square(1))?;

        if !roi.is_rectangle() {
            clear_outside(&mut labels, request, roi);
        }

        let (regions, count) = label_regions(&labels, Connectivity::Four)?;
        let stats = label_statistics(&intensity, &regions, count)?;
        let outlines = region_outlines(&regions, count);
        let range = self.params.intensity_range();

        let mut objects = Vec::with_capacity(count);
        let mut rejected = 0usize;
        for (outline, stats) in outlines.into_iter().zip(stats.iter()) {
            let Some(outline) = outline else { continue };
            if let Some((min, max)) = range {
                let mean = stats.mean();
                if mean < min || mean > max {
                    rejected += 1;
                    continue;
                }
            }
            let polygon = to_image_space(&outline, request.downsample, request.x as f64, request.y as f64);
            match Roi::polygon(polygon) {
                Ok(tile_roi) => objects.push(PathObject::new(
                    ObjectKind::Tile,
                    tile_roi.with_plane(request.z, request.t),
                )),
                Err(_) => rejected += 1,
            }
        }
        debug!(
            "{} superpixels created, {} rejected in {}",
            objects.len(),
            rejected,
            request
        );
        Ok(objects)
    }
}

/// `|G(sigma) - G(1.6 sigma)|` of `image`
fn dog_response(image: &ScalarImage, sigma: f64) -> Result<ScalarImage> {
    let fine = gaussian_blur(image, sigma)?;
    let coarse = gaussian_blur(image, sigma * DOG_SIGMA_RATIO)?;
    let diff: Vec<f32> = fine
        .data()
        .iter()
        .zip(coarse.data().iter())
        .map(|(a, b)| (a - b).abs())
        .collect();
    image.with_data(diff)
}

/// Clear labels whose pixel centre lies outside `roi` or within one pixel
/// of its outline
fn clear_outside(labels: &mut LabelImage, request: &RegionRequest, roi: &Roi) {
    let ds = request.downsample;
    let origin = Coord {
        x: request.x as f64,
        y: request.y as f64,
    };
    for ((row, col), label) in labels.data_mut().indexed_iter_mut() {
        if *label == 0 {
            continue;
        }
        let x = origin.x + (col as f64 + 0.5) * ds;
        let y = origin.y + (row as f64 + 0.5) * ds;
        if !roi.contains_point(x, y) || roi.distance_to_outline(x, y) <= ds {
            *label = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histotile_core::raster::rgb;
    use histotile_core::PixelCalibration;

    fn converter(ds: f64) -> UnitConverter {
        UnitConverter::new(PixelCalibration::uncalibrated(), ds).unwrap()
    }

    #[test]
    fn test_intensity_range() {
        let params = DogSuperpixelParams::default();
        assert_eq!(params.intensity_range(), Some((10.0, 230.0)));
        let equal = DogSuperpixelParams {
            min_threshold: 50.0,
            max_threshold: 50.0,
            ..Default::default()
        };
        assert_eq!(equal.intensity_range(), None);
        let open = DogSuperpixelParams {
            min_threshold: f64::NAN,
            max_threshold: f64::INFINITY,
            ..Default::default()
        };
        assert_eq!(open.intensity_range(), None);
        let half_open = DogSuperpixelParams {
            min_threshold: f64::NEG_INFINITY,
            max_threshold: 100.0,
            ..Default::default()
        };
        assert_eq!(half_open.intensity_range(), Some((f64::NEG_INFINITY, 100.0)));
    }

    #[test]
    fn test_two_blobs_give_separate_superpixels() {
        let params = DogSuperpixelParams {
            downsample: 1.0,
            sigma: PhysicalLength::new(2.0, 2.0),
            min_threshold: f64::NAN,
            max_threshold: f64::NAN,
            ..Default::default()
        };
        let segmenter = DogSuperpixelSegmenter::new(params).unwrap();
        let mut tile = RgbImage::filled(32, 48, rgb::gray(40));
        for (cx, cy) in [(12.0, 16.0), (36.0, 16.0)] {
            for row in 0..32 {
                for col in 0..48 {
                    let d2: f64 = (col as f64 - cx).powi(2) + (row as f64 - cy).powi(2);
                    if d2 < 36.0 {
                        tile.set(row, col, rgb::gray(220)).unwrap();
                    }
                }
            }
        }
        let request = RegionRequest::new("blobs", 1.0, 0, 0, 48, 32).unwrap();
        let roi = Roi::rectangle(0.0, 0.0, 48.0, 32.0).unwrap();
        let objects = segmenter.segment_tile(&tile, &request, &roi, &converter(1.0)).unwrap();
        assert!(objects.len() >= 2);
        assert!(objects.iter().all(|o| o.kind() == ObjectKind::Tile));
        assert!(objects.iter().all(|o| o.measurements().is_empty()));
        for object in &objects {
            let (cx, cy) = object.roi().centroid();
            assert!((0.0..=48.0).contains(&cx) && (0.0..=32.0).contains(&cy));
        }
    }

    #[test]
    fn test_polygon_roi_clears_outside() {
        let params = DogSuperpixelParams {
            downsample: 1.0,
            sigma: PhysicalLength::new(2.0, 2.0),
            ..Default::default()
        };
        let segmenter = DogSuperpixelSegmenter::new(params).unwrap();
        let tile = RgbImage::filled(40, 40, rgb::gray(128));
        let request = RegionRequest::new("tri", 1.0, 0, 0, 40, 40).unwrap();
        let roi = Roi::from_points(&[(0.0, 0.0), (40.0, 0.0), (0.0, 40.0)]).unwrap();
        let objects = segmenter.segment_tile(&tile, &request, &roi, &converter(1.0)).unwrap();
        assert!(!objects.is_empty());
        for object in &objects {
            let (cx, cy) = object.roi().centroid();
            assert!(cx + cy < 40.0);
        }
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = DogSuperpixelParams {
            downsample: 0.0,
            ..Default::default()
        };
        assert!(DogSuperpixelSegmenter::new(params).is_err());
        let params = DogSuperpixelParams {
            sigma: PhysicalLength::new(0.0, 10.0),
            ..Default::default()
        };
        assert!(DogSuperpixelSegmenter::new(params).is_err());
    }
}

//! Watershed nucleus detection
//!
//! The detection channel is flattened against a morphological background
//! estimate and filtered with a Laplacian of Gaussian. Positive responses
//! are split along intensity ridges, rejected by mean intensity, refined
//! and optionally split again by shape with a distance transform watershed.
//! Surviving outlines become detections carrying shape and intensity
//! measurements.

use geo::Polygon;
use histotile_core::raster::Connectivity;
use histotile_core::{
    Error, LabelImage, MeasurementList, ObjectKind, PathObject, PhysicalArea, PhysicalLength,
    PixelCalibration, RegionContext, RegionRequest, Result, RgbImage, Roi, ScalarImage, StainSet,
    UnitConverter,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::bounds_request;
use crate::color::{ColorTransformMethod, ColorTransformer};
use crate::filters::{gaussian_blur, gaussian_blur_with_radius, laplacian, median_filter};
use crate::morphology::{closing, dilate, opening, reconstruct_by_dilation, StructuringElement};
use crate::segmentation::{
    distance_transform, fill_small_holes, find_maxima, label_components, region_outlines,
    watershed, BinaryImage, WatershedParams,
};
use crate::shape::{
    distinct_vertex_count, edge_midpoints, simplify_outline, to_image_space, ShapeMeasurements,
};
use crate::statistics::{label_statistics, RunningStatistics};

/// Light pre-smoothing applied before background estimation
const LIGHT_BLUR_SIGMA: f64 = 0.75;
const LIGHT_BLUR_RADIUS: usize = 2;
/// Outline simplification tolerance in working pixels
const SIMPLIFY_TOLERANCE: f64 = 0.5;
/// Marker growth before the shape split, so close distance peaks merge
const SHAPE_SPLIT_MERGE_RADIUS: usize = 2;

/// Channel nuclei are detected in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionChannel {
    /// Deconvolved hematoxylin optical density
    #[default]
    Hematoxylin,
    /// Sum of red, green and blue optical densities
    OpticalDensitySum,
    /// RGB mean scaled to [0, 1]; bright nuclei on a dark background
    Intensity,
}

/// Parameters for watershed nucleus detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NucleiParams {
    /// Pixel size to work at in µm, for calibrated images
    pub preferred_pixel_size: f64,
    pub detection_channel: DetectionChannel,
    pub median_radius: PhysicalLength,
    pub gaussian_sigma: PhysicalLength,
    /// Background opening radius; also sets the shape split peak separation
    pub opening_radius: PhysicalLength,
    /// Minimum mean detection channel value of a candidate region
    pub threshold: f64,
    pub min_area: PhysicalArea,
    /// Split touching nuclei by shape
    pub split_shape: bool,
}

impl Default for NucleiParams {
    fn default() -> Self {
        Self {
            preferred_pixel_size: 0.5,
            detection_channel: DetectionChannel::default(),
            median_radius: PhysicalLength::new(1.0, 1.0),
            gaussian_sigma: PhysicalLength::new(1.5, 2.0),
            opening_radius: PhysicalLength::new(8.0, 20.0),
            threshold: 0.1,
            min_area: PhysicalArea::new(25.0, 100.0),
            split_shape: true,
        }
    }
}

impl NucleiParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.preferred_pixel_size.is_finite() && self.preferred_pixel_size > 0.0) {
            return Err(Error::InvalidParameter {
                name: "preferred_pixel_size",
                value: self.preferred_pixel_size.to_string(),
                reason: "pixel size must be finite and positive".to_string(),
            });
        }
        self.median_radius.validate("median_radius")?;
        self.gaussian_sigma.validate("gaussian_sigma")?;
        self.opening_radius.validate("opening_radius")?;
        self.min_area.validate("min_area")?;
        if !self.threshold.is_finite() {
            return Err(Error::InvalidParameter {
                name: "threshold",
                value: self.threshold.to_string(),
                reason: "threshold must be finite".to_string(),
            });
        }
        Ok(())
    }
}

/// Parameters resolved to working pixels for one image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NucleiSizes {
    pub downsample: f64,
    pub median_radius: usize,
    pub gaussian_sigma: f64,
    pub opening_radius: usize,
    /// Minimum area in working pixels
    pub min_area_pixels: f64,
    /// Minimum area in µm² when calibrated, otherwise full-resolution pixels
    pub min_area: f64,
}

/// Detects nuclei inside parent ROIs
#[derive(Debug, Clone)]
pub struct NucleiWatershedSegmenter {
    params: NucleiParams,
}

/// Detection channel plus optional DAB channel of a tile
struct Channels {
    detection_name: String,
    detection: ScalarImage,
    dab: Option<ScalarImage>,
}

impl NucleiWatershedSegmenter {
    pub fn new(params: NucleiParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &NucleiParams {
        &self.params
    }

    /// Resolve physical sizes for an image with `calibration`.
    ///
    /// Calibrated images are read at `preferred_pixel_size` (never above
    /// full resolution); uncalibrated images at full resolution.
    pub fn sizes(&self, calibration: &PixelCalibration) -> Result<NucleiSizes> {
        let downsample = match calibration.average_pixel_size_microns() {
            Some(size) => (self.params.preferred_pixel_size / size).max(1.0),
            None => 1.0,
        };
        let converter = UnitConverter::new(*calibration, downsample)?;
        let min_area = if converter.has_microns() {
            self.params.min_area.square_microns
        } else {
            self.params.min_area.pixels
        };
        Ok(NucleiSizes {
            downsample,
            median_radius: converter.radius_to_pixels(&self.params.median_radius),
            gaussian_sigma: converter.length_to_pixels(&self.params.gaussian_sigma),
            opening_radius: converter.radius_to_pixels(&self.params.opening_radius).max(1),
            min_area_pixels: converter.area_to_pixels(&self.params.min_area),
            min_area,
        })
    }

    /// Detect nuclei inside `roi`.
    ///
    /// Returns `Ok(None)` when there is no ROI or its bounds are below one
    /// pixel at the working resolution.
    pub fn detect(&self, ctx: &RegionContext<'_>, roi: Option<&Roi>) -> Result<Option<Vec<PathObject>>> {
        let Some(roi) = roi else {
            debug!("No ROI, nothing to detect");
            return Ok(None);
        };
        let _subscription = ctx.subscribe();
        let metadata = ctx.metadata();
        let sizes = self.sizes(&metadata.calibration)?;
        let Some(request) = bounds_request(ctx, roi, roi.bounds(), sizes.downsample)? else {
            return Ok(None);
        };

        let tile = ctx.fetch(&request)?;
        let objects = self.detect_in_tile(
            &tile,
            &request,
            roi,
            metadata.stains.as_ref(),
            &metadata.calibration,
        )?;
        ctx.cancel.check()?;
        info!("Found {} nuclei in {}", objects.len(), request);
        Ok(Some(objects))
    }

    /// Detect nuclei in a tile read for `request`.
    ///
    /// `calibration` is the full-resolution calibration; outlines and
    /// shape measurements are in full-resolution image space.
    pub fn detect_in_tile(
        &self,
        tile: &RgbImage,
        request: &RegionRequest,
        roi: &Roi,
        stains: Option<&StainSet>,
        calibration: &PixelCalibration,
    ) -> Result<Vec<PathObject>> {
        let sizes = self.sizes(calibration)?;
        let channels = self.channels(tile, stains)?;

        let log = self.log_response(&channels.detection, &sizes)?;
        let binary_log = log.map(|v| u8::from(v > 0.0));

        let split = intensity_split(&log, &binary_log)?;
        let mut binary = reject_faint(&split, &channels.detection, self.params.threshold)?;

        // Re-grow the kept regions up to the original foreground
        binary = dilate(&binary, &StructuringElement::Square(1))?;
        for (b, &f) in binary.data_mut().iter_mut().zip(binary_log.data().iter()) {
            *b = (*b).min(f);
        }
        fill_small_holes(&mut binary, sizes.min_area_pixels * 4.0);

        if self.params.split_shape {
            binary = shape_split(&binary, sizes.opening_radius as f64 / 4.0)?;
        }

        let (components, count) = label_components(&binary, Connectivity::Four)?;
        let outlines = region_outlines(&components, count);

        let mut objects = Vec::new();
        let mut object_labels = vec![0u32; count];
        let mut rejected = 0usize;
        for (i, outline) in outlines.into_iter().enumerate() {
            let Some(outline) = outline else { continue };
            match self.accept_outline(&outline, request, roi, &sizes, calibration) {
                Some((polygon, shape)) => {
                    let mut measurements = MeasurementList::with_capacity(16);
                    shape.write_to(&mut measurements)?;
                    let roi = Roi::polygon(polygon)?.with_plane(request.z, request.t);
                    objects.push(PathObject::with_measurements(ObjectKind::Detection, roi, measurements));
                    object_labels[i] = objects.len() as u32;
                }
                None => rejected += 1,
            }
        }
        debug!("{} candidate nuclei rejected", rejected);

        let labels = components.map(|l| if l == 0 { 0 } else { object_labels[l as usize - 1] });
        let detection_stats = label_statistics(&channels.detection, &labels, objects.len())?;
        let dab_stats = match &channels.dab {
            Some(dab) => Some(label_statistics(dab, &labels, objects.len())?),
            None => None,
        };

        for (i, object) in objects.iter_mut().enumerate() {
            let list = object.measurements_mut();
            write_intensity(list, &channels.detection_name, &detection_stats[i])?;
            if let Some(dab_stats) = &dab_stats {
                write_intensity(list, "DAB", &dab_stats[i])?;
            }
            list.close();
        }
        Ok(objects)
    }

    /// DAB is measured only when the image itself carries H-DAB stains
    fn channels(&self, tile: &RgbImage, image_stains: Option<&StainSet>) -> Result<Channels> {
        let default_stains;
        let stains = match image_stains {
            Some(stains) => stains,
            None => {
                default_stains = StainSet::h_dab()?;
                &default_stains
            }
        };
        let (detection_name, detection) = match self.params.detection_channel {
            DetectionChannel::Hematoxylin => {
                let t = ColorTransformer::new(ColorTransformMethod::Deconvolved { index: 0 }, Some(stains))?;
                (t.name().to_string(), t.transform(tile)?)
            }
            DetectionChannel::OpticalDensitySum => {
                let t = ColorTransformer::new(ColorTransformMethod::OpticalDensitySum, Some(stains))?;
                (t.name().to_string(), t.transform(tile)?)
            }
            DetectionChannel::Intensity => {
                let t = ColorTransformer::new(ColorTransformMethod::Grayscale, None)?;
                ("Intensity".to_string(), t.transform(tile)?.map(|v| v / 255.0))
            }
        };
        let dab = match image_stains.filter(|s| s.is_h_dab()) {
            Some(stains) => {
                let t = ColorTransformer::new(ColorTransformMethod::Deconvolved { index: 1 }, Some(stains))?;
                Some(t.transform(tile)?)
            }
            None => None,
        };
        Ok(Channels {
            detection_name,
            detection,
            dab,
        })
    }

    /// Background-flattened Laplacian of Gaussian, positive on bright blobs
    fn log_response(&self, channel: &ScalarImage, sizes: &NucleiSizes) -> Result<ScalarImage> {
        let mut image = if sizes.median_radius > 0 {
            median_filter(channel, sizes.median_radius)?
        } else {
            channel.clone()
        };
        image = gaussian_blur_with_radius(&image, LIGHT_BLUR_SIGMA, LIGHT_BLUR_RADIUS)?;

        let closed = closing(&image, &StructuringElement::Disk(1))?;
        let smoothed = reconstruct_by_dilation(&image, &closed)?;

        let opened = opening(&smoothed, &StructuringElement::Disk(sizes.opening_radius))?;
        let background = reconstruct_by_dilation(&opened, &smoothed)?;
        let flattened: Vec<f32> = smoothed
            .data()
            .iter()
            .zip(background.data().iter())
            .map(|(s, b)| s - b)
            .collect();
        let flattened = smoothed.with_data(flattened)?;

        let smoothed = gaussian_blur(&flattened, sizes.gaussian_sigma)?;
        Ok(laplacian(&smoothed)?.map(|v| -v))
    }

    fn accept_outline(
        &self,
        outline: &Polygon<f64>,
        request: &RegionRequest,
        roi: &Roi,
        sizes: &NucleiSizes,
        calibration: &PixelCalibration,
    ) -> Option<(Polygon<f64>, ShapeMeasurements)> {
        if distinct_vertex_count(outline) <= 2 {
            return None;
        }
        let simplified = simplify_outline(&edge_midpoints(outline), SIMPLIFY_TOLERANCE);
        if distinct_vertex_count(&simplified) < 3 {
            return None;
        }
        let polygon = to_image_space(&simplified, sizes.downsample, request.x as f64, request.y as f64);
        let shape = ShapeMeasurements::measure(&polygon, calibration);
        if !(shape.area >= sizes.min_area) {
            return None;
        }
        if !roi.is_rectangle() && !roi.contains_polygon(&polygon) {
            return None;
        }
        Some((polygon, shape))
    }
}

/// Split the foreground along valleys of the LoG response
fn intensity_split(log: &ScalarImage, foreground: &BinaryImage) -> Result<BinaryImage> {
    let (markers, _) = find_maxima(log, 0.0, Some(foreground))?;
    let params = WatershedParams {
        threshold: Some(0.0),
        ..Default::default()
    };
    let labels = watershed(log, &markers, Some(foreground), &params)?;
    Ok(labels.map(|l| u8::from(l != 0)))
}

/// Keep the 8-connected components whose mean `channel` value exceeds `threshold`
fn reject_faint(binary: &BinaryImage, channel: &ScalarImage, threshold: f64) -> Result<BinaryImage> {
    let (components, count) = label_components(binary, Connectivity::Eight)?;
    let stats = label_statistics(channel, &components, count)?;
    let keep: Vec<bool> = stats.iter().map(|s| s.mean() > threshold).collect();
    debug!(
        "{} of {} regions above threshold {}",
        keep.iter().filter(|&&k| k).count(),
        count,
        threshold
    );
    Ok(components.map(|l| u8::from(l != 0 && keep[l as usize - 1])))
}

/// Split touching blobs by flooding the distance transform from its peaks
fn shape_split(binary: &BinaryImage, min_peak_separation: f64) -> Result<BinaryImage> {
    let distance = distance_transform(binary)?;
    let (markers, count) = find_maxima(&distance, min_peak_separation, Some(binary))?;
    if count <= 1 {
        return Ok(binary.clone());
    }
    let markers: LabelImage = dilate(&markers, &StructuringElement::Disk(SHAPE_SPLIT_MERGE_RADIUS))?;
    let labels = watershed(&distance, &markers, Some(binary), &WatershedParams::default())?;
    Ok(labels.map(|l| u8::from(l != 0)))
}

fn write_intensity(list: &mut MeasurementList, channel: &str, stats: &RunningStatistics) -> Result<()> {
    list.put(format!("{} mean", channel), stats.mean())?;
    list.put(format!("{} std dev", channel), stats.std_dev())?;
    list.put(format!("{} min", channel), stats.min())?;
    list.put(format!("{} max", channel), stats.max())?;
    list.put(format!("{} range", channel), stats.range())
}

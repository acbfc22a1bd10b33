//! Tile features around an object's centroid
//!
//! A square tile of fixed physical diameter is read around the centroid of
//! each object, transformed into one or more scalar channels and measured.
//! Measurements are named `"<Channel> (<diameter>) <Statistic>"`.

use histotile_core::{
    Error, MeasurementList, PhysicalLength, RegionContext, RegionRequest, Result, RgbImage, Roi,
    StainSet, UnitConverter,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::coherence::coherence;
use super::lbp::{lbp_histogram, LbpPattern};
use super::mask::apply_circular_mask;
use crate::color::StainChoice;
use crate::statistics::RunningStatistics;

/// Feature computed for each channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileFeature {
    #[default]
    Coherence,
    LocalBinaryPatterns,
}

/// Parameters for tile features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileFeatureParams {
    /// Target magnification the tile is read at
    pub magnification: f64,
    pub stain_choice: StainChoice,
    /// Tile diameter, in µm when the image is calibrated
    pub tile_diameter: PhysicalLength,
    /// Add mean, min, max, range and std.dev. per channel.
    /// Defaults to on for coherence and off for LBP.
    pub include_stats: Option<bool>,
    /// Mask pixels outside the inscribed circle
    pub circular: bool,
    pub feature: TileFeature,
    pub lbp: LbpPattern,
}

impl Default for TileFeatureParams {
    fn default() -> Self {
        Self {
            magnification: 5.0,
            stain_choice: StainChoice::default(),
            tile_diameter: PhysicalLength::new(25.0, 200.0),
            include_stats: None,
            circular: false,
            feature: TileFeature::default(),
            lbp: LbpPattern::default(),
        }
    }
}

impl TileFeatureParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.magnification.is_finite() && self.magnification > 0.0) {
            return Err(Error::InvalidParameter {
                name: "magnification",
                value: self.magnification.to_string(),
                reason: "magnification must be positive".to_string(),
            });
        }
        self.tile_diameter.validate("tile_diameter")?;
        match self.lbp {
            LbpPattern::Cross4 { radius } | LbpPattern::UniformRing8 { radius }
                if !(radius.is_finite() && radius >= 1.0) =>
            {
                Err(Error::InvalidParameter {
                    name: "lbp.radius",
                    value: radius.to_string(),
                    reason: "radius must be at least 1 pixel".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn include_stats(&self) -> bool {
        self.include_stats
            .unwrap_or(self.feature == TileFeature::Coherence)
    }
}

/// Measures tile features for objects of one image
#[derive(Debug, Clone)]
pub struct TileFeatureExtractor {
    params: TileFeatureParams,
}

impl TileFeatureExtractor {
    pub fn new(params: TileFeatureParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &TileFeatureParams {
        &self.params
    }

    /// Region read for `roi`, with the diameter label used in measurement
    /// names, or `None` when the tile is smaller than one pixel at the
    /// working resolution or lies outside the image.
    pub fn tile_request(&self, ctx: &RegionContext<'_>, roi: &Roi) -> Result<Option<(RegionRequest, String)>> {
        let metadata = ctx.metadata();
        let downsample = metadata.downsample_for_magnification(self.params.magnification);
        let converter = UnitConverter::new(metadata.calibration, downsample)?;
        let extent = converter.tile_extent(&self.params.tile_diameter);
        if (extent.width as f64) / downsample < 1.0 || (extent.height as f64) / downsample < 1.0 {
            debug!(
                "Tile of {}x{} px is below one pixel at downsample {}, skipping",
                extent.width, extent.height, downsample
            );
            return Ok(None);
        }

        let (cx, cy) = roi.centroid();
        let origin = |c: f64, size: usize| {
            ((c / downsample + 0.5).floor() * downsample).floor() as i64 - (size / 2) as i64
        };
        let request = RegionRequest::new(
            ctx.source.image_id(),
            downsample,
            origin(cx, extent.width),
            origin(cy, extent.height),
            extent.width as u32,
            extent.height as u32,
        )?
        .with_plane(roi.z(), roi.t());

        match request.clip(metadata.width, metadata.height) {
            Some(clipped) => Ok(Some((clipped, extent.label))),
            None => {
                debug!("Tile {} lies outside the image, skipping", request);
                Ok(None)
            }
        }
    }

    /// Read the tile around `roi` and measure it.
    ///
    /// Returns `Ok(None)` when the tile is skipped. Measurements are
    /// collected in a fresh list, so nothing is written for a failed or
    /// cancelled unit.
    pub fn measure(&self, ctx: &RegionContext<'_>, roi: &Roi) -> Result<Option<MeasurementList>> {
        let _subscription = ctx.subscribe();
        let Some((request, label)) = self.tile_request(ctx, roi)? else {
            return Ok(None);
        };
        let tile = ctx.fetch(&request)?;
        let measurements = self.measure_tile(&tile, ctx.metadata().stains.as_ref(), &label)?;
        ctx.cancel.check()?;
        Ok(Some(measurements))
    }

    /// Measure an already read tile
    pub fn measure_tile(
        &self,
        tile: &RgbImage,
        image_stains: Option<&StainSet>,
        diameter_label: &str,
    ) -> Result<MeasurementList> {
        let transformers = self.params.stain_choice.transformers(image_stains)?;
        let include_stats = self.params.include_stats();
        let mut list = MeasurementList::new();

        for transformer in &transformers {
            let mut channel = transformer.transform(tile)?;
            if self.params.circular {
                apply_circular_mask(&mut channel);
            }
            let prefix = format!("{} ({})", transformer.name(), diameter_label);

            if include_stats {
                let stats: RunningStatistics = channel.data().iter().copied().collect();
                list.put(format!("{} Mean", prefix), stats.mean())?;
                list.put(format!("{} Min", prefix), stats.min())?;
                list.put(format!("{} Max", prefix), stats.max())?;
                list.put(format!("{} Range", prefix), stats.range())?;
                list.put(format!("{} Std.dev.", prefix), stats.std_dev())?;
            }

            match self.params.feature {
                TileFeature::Coherence => {
                    list.put(format!("{} coherence", prefix), coherence(&channel))?;
                }
                TileFeature::LocalBinaryPatterns => {
                    let histogram = lbp_histogram(&channel, &self.params.lbp);
                    for (k, value) in histogram.into_iter().enumerate() {
                        list.put(format!("{} LBP {}", prefix, k + 1), value)?;
                    }
                }
            }
        }
        Ok(list)
    }
}

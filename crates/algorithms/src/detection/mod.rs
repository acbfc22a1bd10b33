//! Object detection pipelines
//!
//! - **superpixels**: difference-of-Gaussians superpixel tiles
//! - **nuclei**: watershed nucleus detection with shape and intensity measurements

mod nuclei;
mod superpixels;

pub use nuclei::{DetectionChannel, NucleiParams, NucleiSizes, NucleiWatershedSegmenter};
pub use superpixels::{DogSuperpixelParams, DogSuperpixelSegmenter};

use geo::Rect;
use histotile_core::{RegionContext, RegionRequest, Result, Roi};
use tracing::debug;

/// Request covering `bounds` at `downsample`, clipped to the image.
///
/// `None` when the region is below one pixel at the downsample or lies
/// outside the image.
pub(crate) fn bounds_request(
    ctx: &RegionContext<'_>,
    roi: &Roi,
    bounds: Rect<f64>,
    downsample: f64,
) -> Result<Option<RegionRequest>> {
    let x = bounds.min().x.floor();
    let y = bounds.min().y.floor();
    let width = bounds.max().x.ceil() - x;
    let height = bounds.max().y.ceil() - y;
    if (width / downsample).round() < 1.0 || (height / downsample).round() < 1.0 {
        debug!(
            "Region {}x{} is below one pixel at downsample {}, skipping",
            width, height, downsample
        );
        return Ok(None);
    }

    let metadata = ctx.metadata();
    let request = RegionRequest::new(
        ctx.source.image_id(),
        downsample,
        x as i64,
        y as i64,
        width as u32,
        height as u32,
    )?
    .with_plane(roi.z(), roi.t());
    let clipped = request.clip(metadata.width, metadata.height);
    if clipped.is_none() {
        debug!("Region {} lies outside the image, skipping", request);
    }
    Ok(clipped)
}

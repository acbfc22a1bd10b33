//! Region source backed by a fully loaded RGB image

use crate::error::{Error, Result};
use crate::image::ImageMetadata;
use crate::raster::{rgb, RgbImage};
use crate::region::{RegionRequest, RegionSource};

/// Serves regions of an image held in memory.
///
/// Downsampled reads average all full-resolution pixels whose centers fall
/// inside each output pixel.
#[derive(Debug, Clone)]
pub struct MemoryRegionSource {
    id: String,
    metadata: ImageMetadata,
    pixels: RgbImage,
}

impl MemoryRegionSource {
    /// Wrap `pixels`; width, height and calibration are taken from the image
    pub fn new(id: impl Into<String>, pixels: RgbImage) -> Result<Self> {
        let metadata = ImageMetadata::new(pixels.width(), pixels.height())?
            .with_calibration(*pixels.calibration());
        Ok(Self {
            id: id.into(),
            metadata,
            pixels,
        })
    }

    /// Replace the metadata, e.g. to add magnification or stains
    pub fn with_metadata(mut self, metadata: ImageMetadata) -> Result<Self> {
        if metadata.width != self.pixels.width() || metadata.height != self.pixels.height() {
            return Err(Error::SizeMismatch {
                er: self.pixels.height(),
                ec: self.pixels.width(),
                ar: metadata.height,
                ac: metadata.width,
            });
        }
        self.metadata = metadata;
        Ok(self)
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}

impl RegionSource for MemoryRegionSource {
    fn image_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    fn read_region(&self, request: &RegionRequest) -> Result<RgbImage> {
        let clipped = request
            .clip(self.pixels.width(), self.pixels.height())
            .ok_or_else(|| Error::RegionRead {
                request: request.to_string(),
                reason: "region lies outside the image".to_string(),
            })?;

        let (out_w, out_h) = clipped.output_size();
        let ds_x = clipped.width as f64 / out_w as f64;
        let ds_y = clipped.height as f64 / out_h as f64;
        let x0 = clipped.x as usize;
        let y0 = clipped.y as usize;
        let (src_w, src_h) = (clipped.width as usize, clipped.height as usize);

        let pixels = self.pixels.data();
        let mut data = Vec::with_capacity(out_w * out_h);
        for oy in 0..out_h {
            let (sy0, sy1) = source_span(oy, ds_y, src_h);
            for ox in 0..out_w {
                let (sx0, sx1) = source_span(ox, ds_x, src_w);
                let mut sum = [0u64; 3];
                let mut n = 0u64;
                for sy in sy0..sy1 {
                    for sx in sx0..sx1 {
                        let p = pixels[[y0 + sy, x0 + sx]];
                        sum[0] += rgb::red(p) as u64;
                        sum[1] += rgb::green(p) as u64;
                        sum[2] += rgb::blue(p) as u64;
                        n += 1;
                    }
                }
                let avg = |s: u64| ((s + n / 2) / n) as u8;
                data.push(rgb::pack(avg(sum[0]), avg(sum[1]), avg(sum[2])));
            }
        }

        let mut tile = RgbImage::from_vec(data, out_h, out_w)?;
        tile.set_calibration(self.metadata.calibration.scaled(clipped.downsample));
        Ok(tile)
    }
}

/// Source pixel range covered by output pixel `i`, never empty
fn source_span(i: usize, scale: f64, len: usize) -> (usize, usize) {
    let start = ((i as f64 * scale).round() as usize).min(len - 1);
    let end = (((i + 1) as f64 * scale).round() as usize).clamp(start + 1, len);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard() -> RgbImage {
        let data = (0..16)
            .map(|i| if (i / 4 + i % 4) % 2 == 0 { rgb::gray(200) } else { rgb::gray(100) })
            .collect();
        RgbImage::from_vec(data, 4, 4).unwrap()
    }

    #[test]
    fn test_full_resolution_read() {
        let source = MemoryRegionSource::new("board", checkerboard()).unwrap();
        let request = RegionRequest::new("board", 1.0, 1, 1, 2, 2).unwrap();
        let tile = source.read_region(&request).unwrap();
        assert_eq!(tile.shape(), (2, 2));
        assert_eq!(tile.get(0, 0).unwrap(), rgb::gray(200));
        assert_eq!(tile.get(0, 1).unwrap(), rgb::gray(100));
    }

    #[test]
    fn test_downsampled_read_averages() {
        let source = MemoryRegionSource::new("board", checkerboard()).unwrap();
        let request = RegionRequest::new("board", 2.0, 0, 0, 4, 4).unwrap();
        let tile = source.read_region(&request).unwrap();
        assert_eq!(tile.shape(), (2, 2));
        for v in tile.data().iter() {
            assert_eq!(*v, rgb::gray(150));
        }
    }

    #[test]
    fn test_read_outside_image_fails() {
        let source = MemoryRegionSource::new("board", checkerboard()).unwrap();
        let request = RegionRequest::new("board", 1.0, 10, 10, 2, 2).unwrap();
        assert!(source.read_region(&request).is_err());
    }
}

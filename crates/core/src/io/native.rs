//! Native RGB TIFF reading/writing
//!
//! Uses the `tiff` crate. 8-bit and 16-bit gray, RGB and RGBA images are
//! read into packed RGB; the pixel size is taken from the resolution tags
//! when they use centimeters or inches.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use tiff::decoder::{ifd::Value, Decoder, DecodingResult};
use tiff::encoder::colortype::RGB8;
use tiff::encoder::{Rational, TiffEncoder};
use tiff::tags::{ResolutionUnit, Tag};
use tiff::ColorType;

use crate::calibration::PixelCalibration;
use crate::error::{Error, Result};
use crate::raster::{rgb, RgbImage};

/// Read an RGB TIFF file; the calibration is stored on the returned image
pub fn read_rgb_tiff<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let file = File::open(path.as_ref())?;
    decode_rgb_tiff(file)
}

/// Read an RGB TIFF from an in-memory buffer
pub fn read_rgb_tiff_from_buffer(data: &[u8]) -> Result<RgbImage> {
    decode_rgb_tiff(Cursor::new(data))
}

fn decode_rgb_tiff<R>(reader: R) -> Result<RgbImage>
where
    R: std::io::Read + std::io::Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let color_type = decoder
        .colortype()
        .map_err(|e| Error::Other(format!("Cannot read color type: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let samples = match color_type {
        ColorType::Gray(_) => 1,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) => 4,
        other => {
            return Err(Error::UnsupportedDataType(format!(
                "Unsupported TIFF color type: {:?}",
                other
            )))
        }
    };

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let channels: Vec<u8> = match result {
        DecodingResult::U8(buf) => buf,
        DecodingResult::U16(buf) => buf.iter().map(|&v| (v >> 8) as u8).collect(),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Only 8-bit and 16-bit TIFF samples are supported".to_string(),
            ))
        }
    };

    if channels.len() != rows * cols * samples {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let data: Vec<u32> = channels
        .chunks_exact(samples)
        .map(|px| match samples {
            1 => rgb::gray(px[0]),
            _ => rgb::pack(px[0], px[1], px[2]),
        })
        .collect();

    let mut image = RgbImage::from_vec(data, rows, cols)?;
    image.set_calibration(read_calibration(&mut decoder));
    Ok(image)
}

/// Pixel size from XResolution / YResolution, uncalibrated when absent
fn read_calibration<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> PixelCalibration {
    let microns_per_unit = match decoder.find_tag(Tag::ResolutionUnit) {
        Ok(Some(v)) => match v.into_u32() {
            Ok(2) => 25_400.0,
            Ok(3) => 10_000.0,
            _ => return PixelCalibration::uncalibrated(),
        },
        _ => return PixelCalibration::uncalibrated(),
    };

    let mut size = |tag: Tag| -> Option<f64> {
        match decoder.find_tag(tag) {
            Ok(Some(Value::Rational(n, d))) if n > 0 && d > 0 => {
                Some(microns_per_unit * d as f64 / n as f64)
            }
            _ => None,
        }
    };

    match (size(Tag::XResolution), size(Tag::YResolution)) {
        (Some(w), Some(h)) => {
            PixelCalibration::microns(w, h).unwrap_or_else(|_| PixelCalibration::uncalibrated())
        }
        _ => PixelCalibration::uncalibrated(),
    }
}

/// Write a packed RGB image as an 8-bit RGB TIFF file
pub fn write_rgb_tiff<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    encode_rgb_tiff(image, file)
}

/// Write a packed RGB image to an in-memory TIFF buffer
pub fn write_rgb_tiff_to_buffer(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_rgb_tiff(image, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_rgb_tiff<W>(image: &RgbImage, writer: W) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = image.shape();
    let data: Vec<u8> = image
        .data()
        .iter()
        .flat_map(|&p| [rgb::red(p), rgb::green(p), rgb::blue(p)])
        .collect();

    let mut tiff = encoder
        .new_image::<RGB8>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let calibration = image.calibration();
    if let (Some(w), Some(h)) = (calibration.pixel_width_microns(), calibration.pixel_height_microns()) {
        // Pixels per centimeter, kept to three decimals
        tiff.resolution_unit(ResolutionUnit::Centimeter);
        tiff.x_resolution(Rational {
            n: (10_000_000.0 / w).round() as u32,
            d: 1000,
        });
        tiff.y_resolution(Rational {
            n: (10_000_000.0 / h).round() as u32,
            d: 1000,
        });
    }

    tiff.write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

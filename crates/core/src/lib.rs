//! # histotile core
//!
//! Core types, traits and I/O for histotile.
//!
//! This crate provides:
//! - `Raster<T>`: Generic image grid type (scalar channels, labels, packed RGB)
//! - `PixelCalibration` and `UnitConverter`: physical to pixel unit conversion
//! - `StainSet`: stain vectors for color deconvolution
//! - `Roi`, `PathObject`, `MeasurementList`: objects and their measurements
//! - `RegionSource` / `RegionStore`: concurrent, cached region reads

pub mod calibration;
pub mod error;
pub mod image;
pub mod io;
pub mod measurement;
pub mod object;
pub mod raster;
pub mod region;
pub mod roi;
pub mod stains;

pub use calibration::{PhysicalArea, PhysicalLength, PixelCalibration, UnitConverter};
pub use error::{Error, Result};
pub use image::ImageMetadata;
pub use measurement::MeasurementList;
pub use object::{ObjectKind, PathObject};
pub use raster::{LabelImage, Raster, RasterElement, RgbImage, ScalarImage};
pub use region::{CancellationToken, RegionContext, RegionRequest, RegionSource, RegionStore};
pub use roi::Roi;
pub use stains::{StainKind, StainSet, StainVector};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::calibration::{PhysicalArea, PhysicalLength, PixelCalibration, UnitConverter};
    pub use crate::error::{Error, Result};
    pub use crate::measurement::MeasurementList;
    pub use crate::raster::{LabelImage, Raster, RasterElement, RgbImage, ScalarImage};
    pub use crate::region::{CancellationToken, RegionContext, RegionRequest, RegionSource, RegionStore};
    pub use crate::roi::Roi;
}

//! Segmentation primitives
//!
//! - **labeling**: connected components of binary masks and label images
//! - **maxima**: regional maxima with a noise tolerance
//! - **watershed**: marker-controlled flooding with optional watershed lines
//! - **distance**: exact Euclidean distance transform
//! - **holes**: filling enclosed background components
//! - **contour**: outer boundary tracing of labelled regions

mod contour;
mod distance;
mod holes;
mod labeling;
mod maxima;
mod watershed;

pub use contour::{region_outlines, trace_outline};
pub use distance::distance_transform;
pub use holes::{fill_holes, fill_small_holes};
pub use labeling::{label_components, label_regions};
pub use maxima::find_maxima;
pub use watershed::{watershed, WatershedParams};

/// Binary mask; any non-zero value is foreground
pub type BinaryImage = histotile_core::Raster<u8>;

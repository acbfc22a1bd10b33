//! # histotile algorithms
//!
//! Tile features and segmentation pipelines for histotile.
//!
//! ## Available Algorithm Categories
//!
//! - **color**: Optical density, stain deconvolution, raw channels
//! - **features**: Circular mask, structure tensor coherence, LBP, per-object tile features
//! - **statistics**: Running statistics, per-label statistics
//! - **filters**: Gaussian, median, Laplacian
//! - **morphology**: Erode, dilate, opening, closing, reconstruction
//! - **segmentation**: Labeling, maxima, watershed, distance transform, holes, contours
//! - **shape**: Polygon simplification and shape measurements
//! - **detection**: DoG superpixels, watershed nuclei

pub mod color;
pub mod detection;
pub mod features;
pub mod filters;
pub(crate) mod maybe_rayon;
pub mod morphology;
pub mod segmentation;
pub mod shape;
pub mod statistics;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::color::{ColorTransformMethod, ColorTransformer, StainChoice};
    pub use crate::detection::{
        DetectionChannel, DogSuperpixelParams, DogSuperpixelSegmenter, NucleiParams,
        NucleiWatershedSegmenter,
    };
    pub use crate::features::{
        apply_circular_mask, coherence, lbp_histogram, LbpPattern, TileFeature,
        TileFeatureExtractor, TileFeatureParams,
    };
    pub use crate::statistics::{label_statistics, RunningStatistics};
    pub use histotile_core::prelude::*;
}

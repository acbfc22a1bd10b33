//! Per-tile texture and structure features
//!
//! - **mask**: circular masking of square tiles
//! - **coherence**: structure tensor coherence
//! - **lbp**: local binary pattern histograms
//! - **tile**: per-object tile extraction and measurement

mod coherence;
mod lbp;
mod mask;
mod tile;

pub use coherence::{coherence, StructureTensor};
pub use lbp::{lbp_histogram, LbpPattern};
pub use mask::apply_circular_mask;
pub use tile::{TileFeature, TileFeatureExtractor, TileFeatureParams};

//! Color transforms from packed RGB pixels to scalar channels
//!
//! - **transform**: per-pixel transforms (optical density, stain
//!   deconvolution, raw channels, grayscale)
//! - **choice**: named stain choices expanding to one or more channels

mod choice;
mod transform;

pub use choice::StainChoice;
pub use transform::{ColorTransformMethod, ColorTransformer, OD_8BIT_MAX};

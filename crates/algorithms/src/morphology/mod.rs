//! Mathematical morphology
//!
//! - **Erosion**: minimum filter (shrinks bright regions)
//! - **Dilation**: maximum filter (expands bright regions, grows labels)
//! - **Opening**: erosion then dilation (removes small bright features)
//! - **Closing**: dilation then erosion (fills small dark gaps)
//! - **Reconstruction**: conditional dilation of a marker under a mask to stability

mod closing;
mod dilate;
mod element;
mod erode;
mod extremum;
mod opening;
mod reconstruction;

pub use closing::closing;
pub use dilate::dilate;
pub use element::StructuringElement;
pub use erode::erode;
pub use opening::opening;
pub use reconstruction::reconstruct_by_dilation;

//! Streaming statistics over pixel values
//!
//! - **running**: NaN-aware mean / min / max / standard deviation accumulator
//! - **labels**: one accumulator per label of a label image, filled in a single pass

mod labels;
mod running;

pub use labels::label_statistics;
pub use running::RunningStatistics;

//! I/O for RGB images and in-memory region sources

mod memory;
mod native;

pub use memory::MemoryRegionSource;
pub use native::{read_rgb_tiff, read_rgb_tiff_from_buffer, write_rgb_tiff, write_rgb_tiff_to_buffer};

//! Smoothing and derivative filters for scalar images

mod gaussian;
mod laplacian;
mod median;

pub use gaussian::{gaussian_blur, gaussian_blur_with_radius, gaussian_kernel};
pub use laplacian::laplacian;
pub use median::median_filter;

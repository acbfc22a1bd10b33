//! Main image grid type

use crate::calibration::PixelCalibration;
use crate::error::{Error, Result};
use crate::raster::RasterElement;
use ndarray::{Array2, ArrayView2, ArrayViewMut2};

/// A calibrated 2D image grid.
///
/// `Raster<T>` stores values of type `T` row-major in a 2D grid, together
/// with the pixel calibration at the resolution the grid was read at.
///
/// # Example
///
/// ```ignore
/// use histotile_core::Raster;
///
/// // Create a 100x100 scalar image filled with zeros
/// let mut image: Raster<f32> = Raster::new(100, 100);
///
/// // Mask a pixel
/// image.set(10, 20, f32::NAN)?;
/// assert_eq!(image.valid_count(), 100 * 100 - 1);
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Pixel data stored in row-major order (row, col)
    data: Array2<T>,
    /// Physical pixel size at this resolution
    calibration: PixelCalibration,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new image filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            calibration: PixelCalibration::default(),
        }
    }

    /// Create a new image filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            calibration: PixelCalibration::default(),
        }
    }

    /// Create an image from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self {
            data: array,
            calibration: PixelCalibration::default(),
        })
    }

    /// Create an image from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            calibration: PixelCalibration::default(),
        }
    }

    /// Create a zero-filled image of another element type with the same calibration
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            data: Array2::zeros((rows, cols)),
            calibration: self.calibration,
        }
    }

    /// Create an image with the same dimensions and calibration, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            calibration: self.calibration,
        }
    }

    /// Replace the pixel buffer, keeping the calibration
    pub fn with_data<U: RasterElement>(&self, data: Vec<U>) -> Result<Raster<U>> {
        let (rows, cols) = self.shape();
        let mut out = Raster::from_vec(data, rows, cols)?;
        out.calibration = self.calibration;
        Ok(out)
    }

    /// Apply a function to every pixel
    pub fn map<U: RasterElement, F: Fn(T) -> U>(&self, f: F) -> Raster<U> {
        Raster {
            data: self.data.mapv(f),
            calibration: self.calibration,
        }
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Image width in pixels
    pub fn width(&self) -> usize {
        self.cols()
    }

    /// Image height in pixels
    pub fn height(&self) -> usize {
        self.rows()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of pixels
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image has no pixels
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check that another image has the same shape
    pub fn ensure_same_shape<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::SizeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar: other.rows(),
                ac: other.cols(),
            });
        }
        Ok(())
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Set value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn set_unchecked(&mut self, row: usize, col: usize, value: T) {
        unsafe {
            *self.data.uget_mut((row, col)) = value;
        }
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a mutable view of the underlying data
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, T> {
        self.data.view_mut()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Row-major pixel slice
    pub fn as_slice(&self) -> Result<&[T]> {
        self.data
            .as_slice()
            .ok_or_else(|| Error::Other("image buffer is not contiguous".to_string()))
    }

    /// Mutable row-major pixel slice
    pub fn as_slice_mut(&mut self) -> Result<&mut [T]> {
        self.data
            .as_slice_mut()
            .ok_or_else(|| Error::Other("image buffer is not contiguous".to_string()))
    }

    /// Consume the image and return the row-major pixels
    pub fn into_vec(self) -> Vec<T> {
        if self.data.is_standard_layout() {
            if let Some(slice) = self.data.as_slice() {
                return slice.to_vec();
            }
        }
        self.data.iter().copied().collect()
    }

    /// Consume the image and return the underlying array
    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    /// Pixel calibration at this resolution
    pub fn calibration(&self) -> &PixelCalibration {
        &self.calibration
    }

    /// Set the pixel calibration
    pub fn set_calibration(&mut self, calibration: PixelCalibration) {
        self.calibration = calibration;
    }

    // Value checks

    /// Check if pixel at (row, col) is masked
    pub fn is_masked_at(&self, row: usize, col: usize) -> Result<bool> {
        Ok(self.get(row, col)?.is_masked())
    }

    /// Number of pixels that are not masked
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_masked()).count()
    }
}

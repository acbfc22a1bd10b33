//! Circular masking of square tiles

use histotile_core::ScalarImage;

/// Mask pixels outside the circle inscribed in the image.
///
/// The circle is centred at `((w - 1) / 2, (h - 1) / 2)` with radius
/// `max(w, h) / 2`; pixels whose squared distance from the centre exceeds
/// the squared radius become NaN. Returns the number of pixels masked.
pub fn apply_circular_mask(image: &mut ScalarImage) -> usize {
    let (rows, cols) = image.shape();
    let cx = (cols as f64 - 1.0) / 2.0;
    let cy = (rows as f64 - 1.0) / 2.0;
    let radius = rows.max(cols) as f64 / 2.0;
    let radius_sq = radius * radius;

    let mut masked = 0;
    for ((row, col), v) in image.data_mut().indexed_iter_mut() {
        let dx = col as f64 - cx;
        let dy = row as f64 - cy;
        if dx * dx + dy * dy > radius_sq {
            *v = f32::NAN;
            masked += 1;
        }
    }
    masked
}

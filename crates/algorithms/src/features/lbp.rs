//! Local binary pattern histograms
//!
//! Each admissible pixel is compared with a few neighbours sampled at a
//! fixed radius. The comparison bits form a code, and the normalized
//! histogram of codes describes the tile texture.

use histotile_core::ScalarImage;
use serde::{Deserialize, Serialize};

/// Neighbour sampling scheme
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scheme")]
pub enum LbpPattern {
    /// Right, below, left and above at the rounded radius; 16 codes
    Cross4 { radius: f64 },
    /// Eight bilinearly interpolated samples on a circle, folded into the
    /// rotation invariant uniform codes 0..=8 plus one non-uniform bin
    UniformRing8 { radius: f64 },
}

impl Default for LbpPattern {
    fn default() -> Self {
        LbpPattern::Cross4 { radius: 2.0 }
    }
}

impl LbpPattern {
    /// Length of the histogram
    pub fn bins(&self) -> usize {
        match self {
            LbpPattern::Cross4 { .. } => 16,
            LbpPattern::UniformRing8 { .. } => 10,
        }
    }

    fn border(&self) -> usize {
        match *self {
            LbpPattern::Cross4 { radius } => radius.max(0.0).round() as usize,
            LbpPattern::UniformRing8 { radius } => radius.max(0.0).ceil() as usize,
        }
    }
}

/// Normalized histogram of local binary pattern codes.
///
/// Pixels within `radius` of the border, and pixels where the centre or a
/// sample is NaN, are not counted. The result always has `pattern.bins()`
/// entries summing to 1, or all zeros when no pixel is admissible.
pub fn lbp_histogram(image: &ScalarImage, pattern: &LbpPattern) -> Vec<f64> {
    let mut histogram = vec![0.0; pattern.bins()];
    let (rows, cols) = image.shape();
    let border = pattern.border();
    if rows <= 2 * border || cols <= 2 * border {
        return histogram;
    }

    let data = image.data();
    let mut total = 0usize;
    for y in border..rows - border {
        for x in border..cols - border {
            let centre = data[[y, x]];
            if centre.is_nan() {
                continue;
            }
            let code = match *pattern {
                LbpPattern::Cross4 { .. } => {
                    let r = border;
                    let samples = [
                        data[[y, x + r]],
                        data[[y + r, x]],
                        data[[y, x - r]],
                        data[[y - r, x]],
                    ];
                    binary_code(centre, &samples)
                }
                LbpPattern::UniformRing8 { radius } => {
                    let mut samples = [0f32; 8];
                    for (k, s) in samples.iter_mut().enumerate() {
                        let angle = std::f64::consts::TAU * k as f64 / 8.0;
                        let sx = x as f64 + radius * angle.cos();
                        let sy = y as f64 - radius * angle.sin();
                        *s = bilinear(image, sx, sy);
                    }
                    binary_code(centre, &samples).map(uniform_code)
                }
            };
            if let Some(code) = code {
                histogram[code] += 1.0;
                total += 1;
            }
        }
    }

    if total > 0 {
        let n = total as f64;
        histogram.iter_mut().for_each(|h| *h /= n);
    }
    histogram
}

/// Bit `k` set when sample `k >= centre`; `None` if any sample is NaN
fn binary_code(centre: f32, samples: &[f32]) -> Option<usize> {
    let mut code = 0;
    for (k, &s) in samples.iter().enumerate() {
        if s.is_nan() {
            return None;
        }
        if s >= centre {
            code |= 1 << k;
        }
    }
    Some(code)
}

/// Rotation invariant uniform code: number of set bits when the circular
/// pattern has at most two 0/1 transitions, otherwise 9
fn uniform_code(code: usize) -> usize {
    let rotated = ((code >> 1) | ((code & 1) << 7)) & 0xff;
    let transitions = (code ^ rotated).count_ones();
    if transitions <= 2 {
        code.count_ones() as usize
    } else {
        9
    }
}

fn bilinear(image: &ScalarImage, x: f64, y: f64) -> f32 {
    let (rows, cols) = image.shape();
    let data = image.data();
    let x0 = (x.floor().max(0.0) as usize).min(cols - 1);
    let y0 = (y.floor().max(0.0) as usize).min(rows - 1);
    let x1 = (x0 + 1).min(cols - 1);
    let y1 = (y0 + 1).min(rows - 1);
    let fx = (x - x0 as f64).clamp(0.0, 1.0);
    let fy = (y - y0 as f64).clamp(0.0, 1.0);
    let at = |r: usize, c: usize| data[[r, c]] as f64;

    let top = at(y0, x0) * (1.0 - fx) + at(y0, x1) * fx;
    let bottom = at(y1, x0) * (1.0 - fx) + at(y1, x1) * fx;
    (top * (1.0 - fy) + bottom * fy) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn make_image(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f32) -> ScalarImage {
        let data = (0..rows * cols).map(|i| f(i / cols, i % cols)).collect();
        ScalarImage::from_vec(data, rows, cols).unwrap()
    }

    #[test]
    fn test_fixed_length_and_normalized() {
        let image = make_image(20, 20, |row, col| ((row * 7 + col * 13) % 17) as f32);
        let hist = lbp_histogram(&image, &LbpPattern::default());
        assert_eq!(hist.len(), 16);
        assert!(hist.iter().all(|&h| h >= 0.0));
        assert_abs_diff_eq!(hist.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_image_sets_all_bits() {
        let image = ScalarImage::filled(10, 10, 3.0);
        let hist = lbp_histogram(&image, &LbpPattern::default());
        assert_eq!(hist[15], 1.0);
        assert!(hist[..15].iter().all(|&h| h == 0.0));
    }

    #[test]
    fn test_horizontal_ramp() {
        // Only the right neighbour (bit 0) and the equal vertical neighbours (bits 1, 3) are >= centre
        let image = make_image(9, 9, |_, col| col as f32);
        let hist = lbp_histogram(&image, &LbpPattern::Cross4 { radius: 2.0 });
        assert_eq!(hist[0b1011], 1.0);
    }

    #[test]
    fn test_masked_pixels_excluded() {
        let mut image = ScalarImage::filled(7, 7, 1.0);
        for col in 0..7 {
            image.set(3, col, f32::NAN).unwrap();
            image.set(4, col, f32::NAN).unwrap();
        }
        let hist = lbp_histogram(&image, &LbpPattern::default());
        // Interior rows are 2..=4; row 2 samples row 4, rows 3 and 4 are masked
        assert!(hist.iter().all(|&h| h == 0.0));
    }

    #[test]
    fn test_too_small_image() {
        let image = ScalarImage::filled(4, 4, 1.0);
        let hist = lbp_histogram(&image, &LbpPattern::default());
        assert_eq!(hist, vec![0.0; 16]);
    }

    #[test]
    fn test_uniform_ring() {
        let pattern = LbpPattern::UniformRing8 { radius: 1.5 };
        let flat = ScalarImage::filled(12, 12, 5.0);
        let hist = lbp_histogram(&flat, &pattern);
        assert_eq!(hist.len(), 10);
        assert_abs_diff_eq!(hist[8], 1.0, epsilon = 1e-12);

        let ramp = make_image(12, 12, |_, col| col as f32);
        let hist = lbp_histogram(&ramp, &pattern);
        assert_abs_diff_eq!(hist.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_eq!(hist[9], 0.0);
    }

    #[test]
    fn test_uniform_code() {
        assert_eq!(uniform_code(0), 0);
        assert_eq!(uniform_code(0xff), 8);
        assert_eq!(uniform_code(0b0000_0111), 3);
        assert_eq!(uniform_code(0b1000_0011), 3);
        assert_eq!(uniform_code(0b0101_0101), 9);
    }
}

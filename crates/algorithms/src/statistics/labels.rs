//! Per-label statistics
//!
//! Computes statistics of a value image for each label of a label image
//! in one pass over the pixel buffer.

use histotile_core::{LabelImage, Result, ScalarImage};

use super::RunningStatistics;

/// Statistics of `values` for labels `1..=label_count`.
///
/// Element `i` of the result holds the statistics of label `i + 1`.
/// Background (0), labels above `label_count` and NaN values are ignored.
pub fn label_statistics(
    values: &ScalarImage,
    labels: &LabelImage,
    label_count: usize,
) -> Result<Vec<RunningStatistics>> {
    values.ensure_same_shape(labels)?;
    let mut stats = vec![RunningStatistics::new(); label_count];

    for (&label, &value) in labels.data().iter().zip(values.data().iter()) {
        if label == 0 {
            continue;
        }
        if let Some(s) = stats.get_mut(label as usize - 1) {
            s.add(value as f64);
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_label_statistics() {
        let values = ScalarImage::from_vec(
            vec![1.0, 2.0, 10.0, 3.0, f32::NAN, 20.0, 5.0, 5.0, 30.0],
            3,
            3,
        )
        .unwrap();
        let labels = LabelImage::from_vec(vec![1, 1, 2, 1, 1, 2, 0, 0, 7], 3, 3).unwrap();
        let stats = label_statistics(&values, &labels, 2).unwrap();

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].count(), 3);
        assert_relative_eq!(stats[0].mean(), 2.0);
        assert_eq!(stats[1].count(), 2);
        assert_relative_eq!(stats[1].mean(), 15.0);
        assert_eq!(stats[1].range(), 10.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let values = ScalarImage::new(2, 2);
        let labels = LabelImage::new(2, 3);
        assert!(label_statistics(&values, &labels, 1).is_err());
    }
}

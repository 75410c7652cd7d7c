//! Small numeric helpers shared by the section queries.

/// Arithmetic mean, or `0` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Centred moving average over `window` values.
///
/// Windows are truncated at both ends of the series, so the first and last
/// values average over fewer neighbours.
#[must_use]
pub fn rolling_mean_centered(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let before = (window - 1) / 2;
    let after = window - 1 - before;

    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(before);
            let end = (i + after + 1).min(values.len());
            mean(&values[start..end])
        })
        .collect()
}

/// Quantile with linear interpolation between the closest ranks.
///
/// `q` is clamped to `[0, 1]`. Returns `0` for an empty slice.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - position.floor();

    (sorted[upper] - sorted[lower]).mul_add(fraction, sorted[lower])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn mean_of_empty() {
        assert!(close(mean(&[]), 0.0));
        assert!(close(mean(&[1.0, 2.0, 6.0]), 3.0));
    }

    #[test]
    fn rolling_mean_truncates_edges() {
        let smoothed = rolling_mean_centered(&[3.0, 6.0, 9.0, 0.0], 3);
        assert!(close(smoothed[0], 4.5));
        assert!(close(smoothed[1], 6.0));
        assert!(close(smoothed[2], 5.0));
        assert!(close(smoothed[3], 4.5));
    }

    #[test]
    fn rolling_mean_window_one_is_identity() {
        assert_eq!(rolling_mean_centered(&[1.0, 2.0], 1), vec![1.0, 2.0]);
        assert!(rolling_mean_centered(&[], 3).is_empty());
    }

    #[test]
    fn quantile_interpolates() {
        let values: Vec<f64> = (1..=5).map(f64::from).collect();
        assert!(close(quantile(&values, 0.75), 4.0));
        assert!(close(quantile(&[1.0, 2.0, 3.0, 4.0], 0.75), 3.25));
        assert!(close(quantile(&[4.0, 1.0], 0.5), 2.5));
        assert!(close(quantile(&[], 0.75), 0.0));
    }
}

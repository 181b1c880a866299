//! Signal transformations for torque and encoder samples.
//!
//! The driver emits samples most-recent-first with raw and filtered values
//! interleaved. These functions put them back into time order, rebuild a
//! continuous rotation angle from the wrapping encoder, and clean up torque.

use log::info;

use crate::config::FormatConfig;

/// Reverse, decimate and trim one raw sample row.
///
/// The row is reversed into chronological order, every `decimation`-th
/// element is kept starting with the first, and the first kept element is
/// dropped.
///
/// # Example
///
/// ```
/// use torque_pipeline::core::transforms::reorder_samples;
///
/// let raw = ["label", "1", "2", "3", "4", "5", "6"];
/// assert_eq!(reorder_samples(&raw, 2), vec!["4", "2", "label"]);
/// ```
pub fn reorder_samples<T: Clone>(fields: &[T], decimation: usize) -> Vec<T> {
    fields
        .iter()
        .rev()
        .step_by(decimation.max(1))
        .skip(1)
        .cloned()
        .collect()
}

/// Parse text samples as integers.
///
/// Empty and non-numeric fields (such as the row label) are dropped.
pub fn parse_samples<S: AsRef<str>>(fields: &[S]) -> Vec<i64> {
    fields
        .iter()
        .filter_map(|field| field.as_ref().trim().parse::<i64>().ok())
        .collect()
}

/// Round to a fixed number of decimal places.
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Convert a raw encoder tick count to an angle within one revolution.
#[inline]
pub fn tick_to_degrees(tick: i64, ticks_per_rev: f64) -> f64 {
    (tick as f64 * 360.0) / ticks_per_rev
}

/// Rebuild a continuous multi-revolution angle from wrapping encoder ticks.
///
/// Each tick is converted to a single-revolution angle. Whenever the angle
/// falls by more than `tolerance_deg` from the previous sample the encoder is
/// assumed to have wrapped and the revolution count goes up by one. Smaller
/// backward steps are treated as noise. Output is rounded to
/// [`crate::config::ANGLE_DECIMALS`] places.
///
/// # Arguments
///
/// * `ticks` - Encoder tick counts in chronological order
/// * `ticks_per_rev` - Ticks in one full revolution
/// * `tolerance_deg` - Minimum drop in degrees counted as a wraparound
///
/// # Example
///
/// ```
/// use torque_pipeline::core::transforms::compound_angles;
///
/// let angles = compound_angles(&[4090, 4094, 2, 5], 4095.0, 10.0);
/// assert_eq!(angles, vec![359.5604, 359.9121, 360.1758, 360.4396]);
/// ```
pub fn compound_angles(ticks: &[i64], ticks_per_rev: f64, tolerance_deg: f64) -> Vec<f64> {
    let mut angles = Vec::with_capacity(ticks.len());
    let mut revolutions: u32 = 0;
    let mut previous_angle = 0.0;

    for (i, &tick) in ticks.iter().enumerate() {
        let current_angle = tick_to_degrees(tick, ticks_per_rev);

        if i > 0 && (previous_angle - current_angle) > tolerance_deg {
            revolutions += 1;
        }

        let compounded = current_angle + f64::from(revolutions) * 360.0;
        angles.push(round_to(compounded, crate::config::ANGLE_DECIMALS));
        previous_angle = current_angle;
    }

    angles
}

/// Zero out torque samples whose magnitude reaches `threshold`.
///
/// Works on raw units and must run before scaling.
///
/// # Returns
///
/// The number of samples that were zeroed.
pub fn nullify_torque_outliers(samples: &mut [i64], threshold: i64) -> usize {
    let mut nullified = 0;
    for sample in samples.iter_mut() {
        if sample.unsigned_abs() >= threshold.unsigned_abs() {
            *sample = 0;
            nullified += 1;
        }
    }
    nullified
}

/// Multiply raw torque samples by the station scaling factor.
///
/// Zero samples stay exactly zero.
pub fn scale_torque(samples: &[i64], scaling_factor: f64) -> Vec<f64> {
    samples
        .iter()
        .map(|&sample| {
            if sample == 0 {
                0.0
            } else {
                sample as f64 * scaling_factor
            }
        })
        .collect()
}

/// Highest scaled torque still below `threshold`.
///
/// The first sample seeds the result even when it is above the threshold;
/// later samples only replace it while they stay below.
///
/// # Example
///
/// ```
/// use torque_pipeline::core::transforms::peak_torque_below;
///
/// assert_eq!(peak_torque_below(&[1400.0, 8000.0, 6900.0], 7000.0), Some(6900.0));
/// assert_eq!(peak_torque_below(&[], 7000.0), None);
/// ```
pub fn peak_torque_below(torque: &[f64], threshold: f64) -> Option<f64> {
    let (&first, rest) = torque.split_first()?;
    Some(rest.iter().fold(first, |peak, &value| {
        if peak <= value && value < threshold {
            value
        } else {
            peak
        }
    }))
}

/// Nullify outliers and scale a torque sequence in one step.
///
/// # Returns
///
/// Tuple of (scaled torque, number of nullified samples).
pub fn sanitize_torque(
    mut samples: Vec<i64>,
    scaling_factor: f64,
    config: &FormatConfig,
) -> (Vec<f64>, usize) {
    let nullified = nullify_torque_outliers(&mut samples, config.outlier_threshold);
    info!("Nullified values: {}", nullified);
    (scale_torque(&samples, scaling_factor), nullified)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_reorder_samples() {
        let raw: Vec<String> = ["label", "1", "2", "3", "4", "5", "6"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let reordered = reorder_samples(&raw, 2);
        assert_eq!(reordered, vec!["4", "2", "label"]);
        assert_eq!(parse_samples(&reordered), vec![4, 2]);
    }

    #[test]
    fn test_reorder_full_row_length() {
        let mut raw = vec!["Torque".to_string()];
        raw.extend((1..=10_000).map(|i| i.to_string()));

        let samples = parse_samples(&reorder_samples(&raw, 2));
        assert_eq!(samples.len(), (10_001 - 1) / 2 - 1);
        // Oldest sample first, newest retained sample last.
        assert_eq!(samples.first(), Some(&9998));
        assert_eq!(samples.last(), Some(&2));
    }

    #[test]
    fn test_reorder_empty() {
        let raw: Vec<String> = Vec::new();
        assert!(reorder_samples(&raw, 2).is_empty());
    }

    #[test]
    fn test_parse_samples_drops_non_numeric() {
        let fields = ["12", "", " 7 ", "abc", "-3", "4.5", "+9"];
        assert_eq!(parse_samples(&fields), vec![12, 7, -3, 9]);
    }

    #[test]
    fn test_round_to() {
        assert!((round_to(359.560439560, 4) - 359.5604).abs() < EPS);
        assert!((round_to(0.00004, 4) - 0.0).abs() < EPS);
        assert!((round_to(1.23456, 2) - 1.23).abs() < EPS);
    }

    #[test]
    fn test_compound_angles_wraparound() {
        let angles = compound_angles(&[4090, 4094, 2, 5], 4095.0, 10.0);
        let expected = [359.5604, 359.9121, 360.1758, 360.4396];

        assert_eq!(angles.len(), expected.len());
        for (a, e) in angles.iter().zip(expected.iter()) {
            assert!((a - e).abs() < EPS, "{} != {}", a, e);
        }
    }

    #[test]
    fn test_compound_angles_multiple_revolutions() {
        let ticks = [0, 2000, 4000, 100, 2000, 4000, 50];
        let angles = compound_angles(&ticks, 4095.0, 10.0);

        assert!(angles[3] > 360.0 && angles[3] < 720.0);
        assert!(angles[6] > 720.0);
        for pair in angles.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn test_compound_angles_small_reversal_is_noise() {
        // 100 ticks is about 8.8 degrees, under the tolerance.
        let angles = compound_angles(&[1000, 900, 950], 4095.0, 10.0);
        assert!(angles[1] < angles[0]);
        assert!(angles[1] < 360.0);
        assert!(angles[2] < 360.0);
    }

    #[test]
    fn test_compound_angles_large_drop_counts_once() {
        // One big drop followed by a steady climb adds exactly one revolution.
        let angles = compound_angles(&[4000, 10, 20, 30], 4095.0, 10.0);
        for angle in &angles[1..] {
            assert!(*angle >= 360.0 && *angle < 720.0);
        }
    }

    #[test]
    fn test_compound_angles_first_sample_never_wraps() {
        let angles = compound_angles(&[0], 4095.0, 10.0);
        assert_eq!(angles, vec![0.0]);
        assert!(compound_angles(&[], 4095.0, 10.0).is_empty());
    }

    #[test]
    fn test_nullify_torque_outliers() {
        let mut samples = vec![100, 7200, -50, 0, 7000, -7000, 6999];
        let nullified = nullify_torque_outliers(&mut samples, 7000);

        assert_eq!(nullified, 3);
        assert_eq!(samples, vec![100, 0, -50, 0, 0, 0, 6999]);
    }

    #[test]
    fn test_scale_torque() {
        let scaled = scale_torque(&[100, 0, -50, 0], 2.0);
        assert_eq!(scaled, vec![200.0, 0.0, -100.0, 0.0]);
    }

    #[test]
    fn test_scale_torque_unit_factor() {
        let scaled = scale_torque(&[1, -2, 3000], 1.0);
        assert_eq!(scaled, vec![1.0, -2.0, 3000.0]);
    }

    #[test]
    fn test_sanitize_torque_nullifies_before_scaling() {
        // 4000 * 2.0 exceeds the threshold after scaling but must survive.
        let (torque, nullified) =
            sanitize_torque(vec![100, 7200, -50, 0, 4000], 2.0, &FormatConfig::default());

        assert_eq!(nullified, 1);
        assert_eq!(torque, vec![200.0, 0.0, -100.0, 0.0, 8000.0]);
    }

    #[test]
    fn test_peak_torque_below_ignores_scaled_overshoot() {
        // Scaled survivors above the threshold never become the peak.
        let torque = vec![200.0, 0.0, -100.0, 0.0, 8000.0, 6400.0];
        assert_eq!(peak_torque_below(&torque, 7000.0), Some(6400.0));
    }

    #[test]
    fn test_peak_torque_below_keeps_first_sample() {
        assert_eq!(peak_torque_below(&[9000.0, 100.0, 50.0], 7000.0), Some(9000.0));
        assert_eq!(peak_torque_below(&[-5.0, -10.0], 7000.0), Some(-5.0));
        assert_eq!(peak_torque_below(&[], 7000.0), None);
    }
}

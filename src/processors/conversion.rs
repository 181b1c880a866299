//! Single-file conversion from a driver export to an ASG CSV.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use thiserror::Error;

use crate::config::FormatConfig;
use crate::core::loaders::{load_sample_rows, RawSampleRows, TorqueAngleCurve};
use crate::core::transforms::{
    compound_angles, parse_samples, peak_torque_below, reorder_samples, sanitize_torque,
};
use crate::core::writers::write_asg_csv;

/// Errors that can occur while turning sample rows into a curve.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("torque row yields {torque_len} samples but encoder row yields {encoder_len}")]
    MisalignedSequences {
        torque_len: usize,
        encoder_len: usize,
    },
}

/// Outcome of converting one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    /// Raw export that was read.
    pub input: PathBuf,
    /// ASG file that was written.
    pub output: PathBuf,
    /// Number of aligned samples written.
    pub samples: usize,
    /// Torque samples zeroed as outliers.
    pub nullified: usize,
    /// Highest scaled torque below the outlier threshold.
    pub peak_torque: Option<f64>,
}

/// Build the aligned torque/angle curve from extracted sample rows.
///
/// Runs reordering and integer parsing on both rows, then outlier removal
/// and scaling on torque and angle reconstruction on the encoder.
///
/// # Returns
///
/// Tuple of (curve, number of nullified torque samples).
///
/// # Errors
///
/// Returns [`ConversionError::MisalignedSequences`] if the two rows do not
/// produce the same number of samples.
pub fn build_curve(
    rows: &RawSampleRows,
    scaling_factor: f64,
    config: &FormatConfig,
) -> std::result::Result<(TorqueAngleCurve, usize), ConversionError> {
    let torque_raw = parse_samples(&reorder_samples(&rows.torque, config.decimation));
    let encoder_raw = parse_samples(&reorder_samples(&rows.encoder, config.decimation));

    if torque_raw.len() != encoder_raw.len() {
        return Err(ConversionError::MisalignedSequences {
            torque_len: torque_raw.len(),
            encoder_len: encoder_raw.len(),
        });
    }

    let (torque, nullified) = sanitize_torque(torque_raw, scaling_factor, config);
    let angle = compound_angles(&encoder_raw, config.ticks_per_rev, config.tolerance_deg);

    Ok((TorqueAngleCurve::new(torque, angle), nullified))
}

/// Convert one driver export to an ASG CSV.
///
/// # Arguments
///
/// * `input` - Path to the raw export
/// * `output` - Path of the ASG file to write
/// * `scaling_factor` - Station scaling factor applied to torque
/// * `config` - Export layout
///
/// # Returns
///
/// A [`FileSummary`] describing what was written.
pub fn convert_file(
    input: &Path,
    output: &Path,
    scaling_factor: f64,
    config: &FormatConfig,
) -> Result<FileSummary> {
    let rows = load_sample_rows(input, config)
        .with_context(|| format!("Failed to read sample rows from {}", input.display()))?;

    let (curve, nullified) = build_curve(&rows, scaling_factor, config)
        .with_context(|| format!("Invalid sample data in {}", input.display()))?;
    debug!(
        "{}: {} samples, final angle {:?}",
        input.display(),
        curve.len(),
        curve.final_angle()
    );

    write_asg_csv(output, &curve)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let summary = FileSummary {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        samples: curve.len(),
        nullified,
        peak_torque: peak_torque_below(&curve.torque, config.outlier_threshold as f64),
    };

    if let Some(peak) = summary.peak_torque {
        info!("Max value for {}: {}", input.display(), peak);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::LoaderError;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    /// Write an export whose sample rows hold `torque` and `ticks` in
    /// chronological order, interleaved and reversed the way the driver does.
    fn create_export(dir: &Path, name: &str, torque: &[i64], ticks: &[i64]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();

        for row in 0..=20 {
            match row {
                17 => writeln!(file, "{}", driver_row("Torque", torque)).unwrap(),
                20 => writeln!(file, "{}", driver_row("Encoder", ticks)).unwrap(),
                _ => writeln!(file, "Meta{},x", row).unwrap(),
            }
        }
        path
    }

    fn driver_row(label: &str, chronological: &[i64]) -> String {
        // Sample i sits at raw index 9998 - 2i (label is index 0).
        let mut fields = vec![String::from("0"); 10_000];
        for (i, value) in chronological.iter().enumerate() {
            let pos = 9998 - 2 * i;
            fields[pos - 1] = value.to_string();
        }
        let mut row = vec![label.to_string()];
        row.extend(fields);
        row.join(",")
    }

    #[test]
    fn test_build_curve_shape() {
        let mut torque = vec!["Torque".to_string()];
        torque.extend((0..10_000).map(|i| (i % 50).to_string()));
        let mut encoder = vec!["Encoder".to_string()];
        encoder.extend((0..10_000).map(|i| (i % 4096).to_string()));

        let rows = RawSampleRows { torque, encoder };
        let (curve, nullified) = build_curve(&rows, 1.0, &FormatConfig::default()).unwrap();

        assert_eq!(curve.torque.len(), 4999);
        assert_eq!(curve.angle.len(), 4999);
        assert_eq!(nullified, 0);
    }

    #[test]
    fn test_build_curve_misaligned() {
        let config = FormatConfig {
            row_fields: 7,
            ..FormatConfig::default()
        };
        let rows = RawSampleRows {
            torque: ["T", "1", "2", "3", "4", "5", "6"].iter().map(|s| s.to_string()).collect(),
            encoder: ["E", "1", "", "3", "4", "5", "6"].iter().map(|s| s.to_string()).collect(),
        };

        let err = build_curve(&rows, 1.0, &config).unwrap_err();
        match err {
            ConversionError::MisalignedSequences {
                torque_len,
                encoder_len,
            } => {
                assert_eq!(torque_len, 2);
                assert_eq!(encoder_len, 1);
            }
        }
    }

    #[test]
    fn test_convert_file() {
        let temp_dir = TempDir::new().unwrap();
        let input = create_export(
            temp_dir.path(),
            "run.nwd",
            &[100, 7200, -50, 0],
            &[4090, 4094, 2, 5],
        );
        let output = temp_dir.path().join("out").join("run.csv");

        let summary = convert_file(&input, &output, 2.0, &FormatConfig::default()).unwrap();

        assert_eq!(summary.samples, 4999);
        assert_eq!(summary.nullified, 1);
        assert_eq!(summary.peak_torque, Some(200.0));

        let content = fs::read_to_string(&output).unwrap();
        assert!(content.starts_with("Task,Bolt,Sequence Step,"));
        assert_eq!(content.matches("\r\n").count(), 5000);
        assert!(!content.replace("\r\n", "").contains('\n'));

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5000);
        assert_eq!(lines[1], "1,1,1,1,0,200.0,n-m,359.5604,359.5604");
        assert_eq!(lines[2], "1,1,1,2,0,0,n-m,359.9121,359.9121");
        assert_eq!(lines[3], "1,1,1,3,0,-100.0,n-m,360.1758,360.1758");
        assert_eq!(lines[4], "1,1,1,4,0,0,n-m,360.4396,360.4396");
    }

    #[test]
    fn test_convert_file_peak_skips_scaled_overshoot() {
        let temp_dir = TempDir::new().unwrap();
        // 4000 survives nullification but scales to 8000.
        let input = create_export(temp_dir.path(), "run.nwd", &[100, 4000, 3000], &[0, 10, 20]);
        let output = temp_dir.path().join("run.csv");

        let summary = convert_file(&input, &output, 2.0, &FormatConfig::default()).unwrap();

        assert_eq!(summary.nullified, 0);
        assert_eq!(summary.peak_torque, Some(6000.0));
    }

    #[test]
    fn test_convert_file_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let input = create_export(temp_dir.path(), "run.nwd", &[10, 20, 30], &[0, 100, 200]);
        let first = temp_dir.path().join("first.csv");
        let second = temp_dir.path().join("second.csv");

        convert_file(&input, &first, 1.5, &FormatConfig::default()).unwrap();
        convert_file(&input, &second, 1.5, &FormatConfig::default()).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn test_convert_file_missing_rows() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("short.nwd");
        {
            let mut file = File::create(&input).unwrap();
            for i in 0..15 {
                writeln!(file, "row{}", i).unwrap();
            }
        }
        let output = temp_dir.path().join("short.csv");

        let err = convert_file(&input, &output, 1.0, &FormatConfig::default()).unwrap_err();

        let loader_err = err.downcast_ref::<LoaderError>().unwrap();
        assert!(loader_err.is_format_error());
        assert!(format!("{:#}", err).contains("short.nwd"));
        assert!(!output.exists());
    }
}

//! Data writers for the ASG output format.
//!
//! Every converted tightening becomes one CSV with a fixed nine-column
//! header and one row per aligned torque/angle sample.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use csv::{Terminator, WriterBuilder};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use super::loaders::TorqueAngleCurve;

/// Torque units written to every row.
pub const TORQUE_UNITS: &str = "n-m";

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Mismatched sequence lengths.
    #[error("sequence length mismatch: torque has {torque_len} samples, angle has {angle_len} samples")]
    LengthMismatch { torque_len: usize, angle_len: usize },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// One row of an ASG-formatted file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsgRow {
    #[serde(rename = "Task")]
    pub task: u32,
    #[serde(rename = "Bolt")]
    pub bolt: u32,
    #[serde(rename = "Sequence Step")]
    pub sequence_step: u32,
    /// 1-based sample index.
    #[serde(rename = "Time (ms)")]
    pub time_index: usize,
    #[serde(rename = "Prevail Torque")]
    pub prevail_torque: u32,
    #[serde(rename = "Torque", serialize_with = "serialize_torque")]
    pub torque: f64,
    #[serde(rename = "Torque Units")]
    pub torque_units: String,
    #[serde(rename = "Angle Total (deg)", serialize_with = "serialize_float")]
    pub angle_total: f64,
    #[serde(
        rename = "Angle since Threshold Torque (deg)",
        serialize_with = "serialize_float"
    )]
    pub angle_since_threshold: f64,
}

impl AsgRow {
    /// Build the row for sample `index` (0-based).
    pub fn new(index: usize, torque: f64, angle: f64) -> Self {
        Self {
            task: 1,
            bolt: 1,
            sequence_step: 1,
            time_index: index + 1,
            prevail_torque: 0,
            torque,
            torque_units: TORQUE_UNITS.to_string(),
            angle_total: angle,
            angle_since_threshold: angle,
        }
    }
}

/// Format a float the way ASG consumers expect it.
///
/// Uses the shortest text that reads back to the same value, always with a
/// fractional part. Values with a decimal exponent below -4 or of 16 and above
/// switch to scientific notation with a signed, two-digit exponent.
///
/// # Example
///
/// ```
/// use torque_pipeline::core::writers::format_float;
///
/// assert_eq!(format_float(200.0), "200.0");
/// assert_eq!(format_float(359.5604), "359.5604");
/// assert_eq!(format_float(0.00001), "1e-05");
/// ```
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if (-4..16).contains(&exponent) {
        let plain = value.to_string();
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.unsigned_abs())
    }
}

fn serialize_float<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_float(*value))
}

// Nullified and zero readings are written as a bare `0`.
fn serialize_torque<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if *value == 0.0 {
        serializer.serialize_u8(0)
    } else {
        serialize_float(value, serializer)
    }
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Write an aligned torque/angle curve as an ASG CSV.
///
/// Writes the header followed by one row per sample, each terminated by
/// CRLF. The file is replaced if it already exists.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `curve` - Aligned torque and angle sequences
///
/// # Errors
///
/// Returns an error if:
/// - torque and angle lengths differ
/// - Parent directories cannot be created
/// - File cannot be created or written to
///
/// # Example
///
/// ```no_run
/// use torque_pipeline::core::loaders::TorqueAngleCurve;
/// use torque_pipeline::core::writers::write_asg_csv;
/// use std::path::Path;
///
/// let curve = TorqueAngleCurve::new(vec![200.0, 0.0], vec![359.5604, 360.1758]);
/// write_asg_csv(Path::new("output.csv"), &curve).unwrap();
/// ```
pub fn write_asg_csv(path: &Path, curve: &TorqueAngleCurve) -> Result<()> {
    if !curve.is_aligned() {
        return Err(WriteError::LengthMismatch {
            torque_len: curve.torque.len(),
            angle_len: curve.angle.len(),
        });
    }

    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let buf_writer = BufWriter::with_capacity(64 * 1024, file);
    let mut csv_writer = WriterBuilder::new()
        .terminator(Terminator::CRLF)
        .from_writer(buf_writer);

    let path_str = path.display().to_string();

    for (i, (&torque, &angle)) in curve.torque.iter().zip(curve.angle.iter()).enumerate() {
        csv_writer
            .serialize(AsgRow::new(i, torque, angle))
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    // An empty curve still gets the header row.
    if curve.is_empty() {
        csv_writer
            .write_record(ASG_HEADER)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Column names of the ASG format, in order.
pub const ASG_HEADER: [&str; 9] = [
    "Task",
    "Bolt",
    "Sequence Step",
    "Time (ms)",
    "Prevail Torque",
    "Torque",
    "Torque Units",
    "Angle Total (deg)",
    "Angle since Threshold Torque (deg)",
];

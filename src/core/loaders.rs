//! Data loaders for SD550 driver exports and ASG output files.
//!
//! This module provides parsers for:
//! - Raw driver exports (`.nwd`), from which only the torque and encoder
//!   sample rows are extracted
//! - ASG-formatted CSV files written by [`super::writers::write_asg_csv`]

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

use super::writers::AsgRow;
use crate::config::FormatConfig;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{path}: {row} sample row (row {index}) is missing")]
    MissingRow {
        path: PathBuf,
        row: &'static str,
        index: usize,
    },

    #[error("{path}: {row} sample row (row {index}) has {found} fields, expected {expected}")]
    FieldCount {
        path: PathBuf,
        row: &'static str,
        index: usize,
        found: usize,
        expected: usize,
    },

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),
}

impl LoaderError {
    /// True for errors caused by the file's layout rather than by I/O.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            LoaderError::MissingRow { .. } | LoaderError::FieldCount { .. }
        )
    }
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// The two significant rows of a driver export, still as text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSampleRows {
    /// Torque row: label followed by samples, most recent first.
    pub torque: Vec<String>,
    /// Encoder row: label followed by tick counts, most recent first.
    pub encoder: Vec<String>,
}

/// Aligned torque and angle sequences for one tightening.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TorqueAngleCurve {
    /// Scaled torque in physical units.
    pub torque: Vec<f64>,
    /// Compounded angle in degrees.
    pub angle: Vec<f64>,
}

impl TorqueAngleCurve {
    /// Creates a curve from already aligned sequences.
    pub fn new(torque: Vec<f64>, angle: Vec<f64>) -> Self {
        Self { torque, angle }
    }

    /// Returns the number of samples in the curve.
    #[inline]
    pub fn len(&self) -> usize {
        self.torque.len()
    }

    /// Returns true if the curve holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.torque.is_empty()
    }

    /// True when torque and angle have the same number of samples.
    #[inline]
    pub fn is_aligned(&self) -> bool {
        self.torque.len() == self.angle.len()
    }

    /// Highest torque reading, if any.
    pub fn peak_torque(&self) -> Option<f64> {
        self.torque.iter().copied().reduce(f64::max)
    }

    /// Final compounded angle, if any.
    pub fn final_angle(&self) -> Option<f64> {
        self.angle.last().copied()
    }
}

/// Split one raw line into fields.
///
/// Invalid UTF-8 is replaced rather than rejected. A blank line has no fields.
fn split_fields(line: &[u8]) -> Result<Vec<String>> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(|c| c == '\n' || c == '\r');

    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(str::to_string).collect()),
        None => Ok(Vec::new()),
    }
}

fn check_row(
    row: Option<Vec<String>>,
    name: &'static str,
    index: usize,
    expected: usize,
    path: &Path,
) -> Result<Vec<String>> {
    let fields = row.ok_or_else(|| LoaderError::MissingRow {
        path: path.to_path_buf(),
        row: name,
        index,
    })?;

    if fields.len() != expected {
        return Err(LoaderError::FieldCount {
            path: path.to_path_buf(),
            row: name,
            index,
            found: fields.len(),
            expected,
        });
    }

    Ok(fields)
}

/// Extract the torque and encoder sample rows from a driver export.
///
/// Rows are counted by physical line, starting at 0. Reading stops after the
/// later of the two sample rows; the rest of the file is never touched.
///
/// # Arguments
///
/// * `path` - Path to the raw export
/// * `config` - Row positions and expected row width
///
/// # Errors
///
/// Returns [`LoaderError::MissingRow`] if the file ends before a sample row,
/// [`LoaderError::FieldCount`] if a sample row has the wrong width, or an IO
/// error if the file cannot be read.
pub fn load_sample_rows<P: AsRef<Path>>(path: P, config: &FormatConfig) -> Result<RawSampleRows> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);

    let last_row = config.torque_row.max(config.encoder_row);
    let mut torque = None;
    let mut encoder = None;

    let mut line = Vec::with_capacity(64 * 1024);
    for row_idx in 0..=last_row {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }

        if row_idx == config.torque_row {
            torque = Some(split_fields(&line)?);
        }
        if row_idx == config.encoder_row {
            encoder = Some(split_fields(&line)?);
        }
    }

    let torque = check_row(torque, "torque", config.torque_row, config.row_fields, path)?;
    let encoder = check_row(encoder, "encoder", config.encoder_row, config.row_fields, path)?;

    Ok(RawSampleRows { torque, encoder })
}

/// Load an ASG-formatted CSV back into a torque/angle curve.
///
/// Uses the `Angle Total (deg)` column as the angle.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a row does not match the ASG
/// schema, or the file holds no data rows.
pub fn load_asg_csv<P: AsRef<Path>>(path: P) -> Result<TorqueAngleCurve> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file));

    let mut curve = TorqueAngleCurve::default();
    for result in reader.deserialize::<AsgRow>() {
        let row = result?;
        curve.torque.push(row.torque);
        curve.angle.push(row.angle_total);
    }

    if curve.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn small_config() -> FormatConfig {
        FormatConfig {
            torque_row: 2,
            encoder_row: 4,
            row_fields: 4,
            ..FormatConfig::default()
        }
    }

    #[test]
    fn test_load_sample_rows() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Header,A").unwrap();
        writeln!(file, "meta").unwrap();
        writeln!(file, "Torque,3,2,1").unwrap();
        writeln!(file, "Other,9,9,9").unwrap();
        writeln!(file, "Encoder,30,20,10").unwrap();
        writeln!(file, "Trailer").unwrap();
        file.flush().unwrap();

        let rows = load_sample_rows(file.path(), &small_config())?;
        assert_eq!(rows.torque, vec!["Torque", "3", "2", "1"]);
        assert_eq!(rows.encoder, vec!["Encoder", "30", "20", "10"]);

        Ok(())
    }

    #[test]
    fn test_load_sample_rows_blank_lines_count_as_rows() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "T,1,2,3").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "E,4,5,6").unwrap();
        file.flush().unwrap();

        let rows = load_sample_rows(file.path(), &small_config())?;
        assert_eq!(rows.torque[0], "T");
        assert_eq!(rows.encoder[0], "E");

        Ok(())
    }

    #[test]
    fn test_load_sample_rows_replaces_invalid_utf8() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"\xff\xfe junk\n").unwrap();
        file.write_all(b"meta\n").unwrap();
        file.write_all(b"T\xe9,1,2,3\r\n").unwrap();
        file.write_all(b"x\n").unwrap();
        file.write_all(b"E,4,5,6\r\n").unwrap();
        file.flush().unwrap();

        let rows = load_sample_rows(file.path(), &small_config())?;
        assert_eq!(rows.torque[0], "T\u{FFFD}");
        assert_eq!(rows.encoder, vec!["E", "4", "5", "6"]);

        Ok(())
    }

    #[test]
    fn test_load_sample_rows_missing_row() {
        let mut file = NamedTempFile::new().unwrap();
        for i in 0..15 {
            writeln!(file, "row{}", i).unwrap();
        }
        file.flush().unwrap();

        let err = load_sample_rows(file.path(), &FormatConfig::default()).unwrap_err();
        assert!(err.is_format_error());
        match err {
            LoaderError::MissingRow { row, index, path } => {
                assert_eq!(row, "torque");
                assert_eq!(index, 17);
                assert_eq!(path, file.path());
            }
            other => panic!("Expected MissingRow, got {:?}", other),
        }
    }

    #[test]
    fn test_load_sample_rows_missing_encoder_row() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a").unwrap();
        writeln!(file, "b").unwrap();
        writeln!(file, "T,1,2,3").unwrap();
        file.flush().unwrap();

        let err = load_sample_rows(file.path(), &small_config()).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::MissingRow { row: "encoder", index: 4, .. }
        ));
    }

    #[test]
    fn test_load_sample_rows_wrong_field_count() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a").unwrap();
        writeln!(file, "b").unwrap();
        writeln!(file, "T,1,2,3").unwrap();
        writeln!(file, "c").unwrap();
        writeln!(file, "E,4,5").unwrap();
        file.flush().unwrap();

        let err = load_sample_rows(file.path(), &small_config()).unwrap_err();
        match err {
            LoaderError::FieldCount {
                row,
                found,
                expected,
                ..
            } => {
                assert_eq!(row, "encoder");
                assert_eq!(found, 3);
                assert_eq!(expected, 4);
            }
            other => panic!("Expected FieldCount, got {:?}", other),
        }
    }

    #[test]
    fn test_load_asg_csv() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "Task,Bolt,Sequence Step,Time (ms),Prevail Torque,Torque,Torque Units,Angle Total (deg),Angle since Threshold Torque (deg)"
        )
        .unwrap();
        writeln!(file, "1,1,1,1,0,200.0,n-m,359.5604,359.5604").unwrap();
        writeln!(file, "1,1,1,2,0,0,n-m,360.1758,360.1758").unwrap();
        file.flush().unwrap();

        let curve = load_asg_csv(file.path())?;
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.torque, vec![200.0, 0.0]);
        assert_eq!(curve.angle, vec![359.5604, 360.1758]);

        Ok(())
    }

    #[test]
    fn test_load_asg_csv_header_only() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "Task,Bolt,Sequence Step,Time (ms),Prevail Torque,Torque,Torque Units,Angle Total (deg),Angle since Threshold Torque (deg)"
        )
        .unwrap();
        file.flush().unwrap();

        let result = load_asg_csv(file.path());
        assert!(matches!(result, Err(LoaderError::EmptyFile(_))));
    }

    #[test]
    fn test_curve_methods() {
        let curve = TorqueAngleCurve::new(vec![1.0, 5.5, -2.0], vec![0.0, 10.0, 20.0]);
        assert_eq!(curve.len(), 3);
        assert!(curve.is_aligned());
        assert_eq!(curve.peak_torque(), Some(5.5));
        assert_eq!(curve.final_angle(), Some(20.0));
        assert_eq!(TorqueAngleCurve::default().peak_torque(), None);
    }
}

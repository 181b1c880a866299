//! Configuration types for the torque pipeline.
//!
//! The constants below describe the SD550 driver export layout. A firmware
//! revision that moves rows or changes sample widths only needs edits here.

use serde::{Deserialize, Serialize};

/// Row index (0-based) holding the torque samples.
pub const TORQUE_ROW_INDEX: usize = 17;

/// Row index (0-based) holding the encoder samples.
pub const ENCODER_ROW_INDEX: usize = 20;

/// Fields in a sample row: one label followed by 10,000 samples.
pub const SAMPLE_ROW_FIELDS: usize = 10_001;

/// The driver interleaves raw and filtered samples; keep every Nth.
pub const DECIMATION_FACTOR: usize = 2;

/// Raw torque magnitude at or above which a sample is treated as overflow.
pub const TORQUE_OUTLIER_THRESHOLD: i64 = 7000;

/// Encoder ticks per revolution (12-bit encoder).
pub const ENCODER_TICKS_PER_REV: f64 = 4095.0;

/// Minimum backward jump in degrees counted as a wraparound.
pub const WRAPAROUND_TOLERANCE_DEG: f64 = 10.0;

/// Number of decimal places kept on compounded angles.
pub const ANGLE_DECIMALS: i32 = 4;

/// Files each station must provide; exactly this many are converted.
pub const REQUIRED_FILES_PER_STATION: usize = 30;

/// Extension of raw driver exports.
pub const INPUT_EXTENSION: &str = "nwd";

/// Layout of a raw driver export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Row index of the torque samples
    #[serde(default = "default_torque_row")]
    pub torque_row: usize,

    /// Row index of the encoder samples
    #[serde(default = "default_encoder_row")]
    pub encoder_row: usize,

    /// Expected field count of both sample rows
    #[serde(default = "default_row_fields")]
    pub row_fields: usize,

    /// Keep every Nth sample after reversal
    #[serde(default = "default_decimation")]
    pub decimation: usize,

    /// Raw torque outlier threshold (absolute value)
    #[serde(default = "default_outlier_threshold")]
    pub outlier_threshold: i64,

    /// Encoder ticks per full revolution
    #[serde(default = "default_ticks_per_rev")]
    pub ticks_per_rev: f64,

    /// Wraparound detection tolerance in degrees
    #[serde(default = "default_tolerance")]
    pub tolerance_deg: f64,
}

fn default_torque_row() -> usize {
    TORQUE_ROW_INDEX
}

fn default_encoder_row() -> usize {
    ENCODER_ROW_INDEX
}

fn default_row_fields() -> usize {
    SAMPLE_ROW_FIELDS
}

fn default_decimation() -> usize {
    DECIMATION_FACTOR
}

fn default_outlier_threshold() -> i64 {
    TORQUE_OUTLIER_THRESHOLD
}

fn default_ticks_per_rev() -> f64 {
    ENCODER_TICKS_PER_REV
}

fn default_tolerance() -> f64 {
    WRAPAROUND_TOLERANCE_DEG
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            torque_row: default_torque_row(),
            encoder_row: default_encoder_row(),
            row_fields: default_row_fields(),
            decimation: default_decimation(),
            outlier_threshold: default_outlier_threshold(),
            ticks_per_rev: default_ticks_per_rev(),
            tolerance_deg: default_tolerance(),
        }
    }
}

impl FormatConfig {
    /// Number of aligned samples a well-formed file yields.
    pub fn expected_samples(&self) -> usize {
        let decimation = self.decimation.max(1);
        (self.row_fields.saturating_sub(1) / decimation).saturating_sub(1)
    }
}

/// Settings for station batch runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Eligible files a station must hold
    #[serde(default = "default_required_files")]
    pub required_files: usize,

    /// Extension of eligible input files (without the dot)
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Convert a station's files on the rayon pool
    #[serde(default)]
    pub parallel: bool,
}

fn default_required_files() -> usize {
    REQUIRED_FILES_PER_STATION
}

fn default_extension() -> String {
    INPUT_EXTENSION.to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            required_files: default_required_files(),
            extension: default_extension(),
            parallel: false,
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub format: FormatConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

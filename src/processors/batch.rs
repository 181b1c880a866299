//! Station batch conversion.
//!
//! A batch run pairs every station subdirectory with one scaling factor,
//! checks that each station holds enough exports, and converts the first
//! `required_files` of them. Failures are isolated: a bad file only fails
//! that file, a short station is skipped, and only a scaling-factor count
//! mismatch stops the run before anything is written.

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use rayon::prelude::*;
use thiserror::Error;

use super::conversion::{convert_file, FileSummary};
use super::discovery::{find_input_files, find_stations, station_name, DiscoveryError};
use crate::config::{BatchConfig, PipelineConfig};

/// Errors that can occur while setting up or running a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("No station subdirectories found in {0}")]
    NoStations(PathBuf),

    #[error(
        "Found {stations} station subdirectories but {factors} scaling factors were supplied. \
         Enter one scaling factor per station, and remove any folders that are not stations"
    )]
    ScalingMismatch { stations: usize, factors: usize },

    #[error("Invalid scaling factor '{value}' at position {position}")]
    InvalidScalingFactor { value: String, position: usize },

    #[error("Station {station} has {found} eligible .{extension} files, at least {required} are required")]
    InsufficientFiles {
        station: String,
        found: usize,
        required: usize,
        extension: String,
    },

    #[error("Failed to create output directory {path}: {source}")]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A tightening station and the scaling factor for its exports.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    /// Directory name.
    pub name: String,
    /// Directory holding the raw exports.
    pub input_dir: PathBuf,
    /// Multiplier applied to every raw torque sample.
    pub scaling_factor: f64,
}

/// A file that could not be converted.
#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    pub input: PathBuf,
    pub reason: String,
}

/// What happened to one station.
#[derive(Debug, Clone, PartialEq)]
pub enum StationOutcome {
    /// The station was processed; some files may still have failed.
    Processed {
        converted: Vec<FileSummary>,
        failed: Vec<FileFailure>,
    },
    /// The station was not processed at all.
    Skipped { reason: String },
}

/// Result of processing one station.
#[derive(Debug, Clone, PartialEq)]
pub struct StationReport {
    pub station: String,
    pub output_dir: PathBuf,
    pub outcome: StationOutcome,
}

impl StationReport {
    fn skipped(station: &Station, output_dir: PathBuf, reason: String) -> Self {
        Self {
            station: station.name.clone(),
            output_dir,
            outcome: StationOutcome::Skipped { reason },
        }
    }

    /// Number of files written for this station.
    pub fn converted_count(&self) -> usize {
        match &self.outcome {
            StationOutcome::Processed { converted, .. } => converted.len(),
            StationOutcome::Skipped { .. } => 0,
        }
    }

    /// Number of files that failed for this station.
    pub fn failed_count(&self) -> usize {
        match &self.outcome {
            StationOutcome::Processed { failed, .. } => failed.len(),
            StationOutcome::Skipped { .. } => 0,
        }
    }

    /// True if the station was skipped.
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, StationOutcome::Skipped { .. })
    }
}

/// Result of a whole batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub stations: Vec<StationReport>,
}

impl BatchReport {
    /// Total files written across all stations.
    pub fn converted_count(&self) -> usize {
        self.stations.iter().map(StationReport::converted_count).sum()
    }

    /// Total files that failed across all stations.
    pub fn failed_count(&self) -> usize {
        self.stations.iter().map(StationReport::failed_count).sum()
    }

    /// Number of stations that were skipped.
    pub fn skipped_count(&self) -> usize {
        self.stations.iter().filter(|s| s.is_skipped()).count()
    }
}

/// Parse a comma-separated list of scaling factors.
///
/// # Example
///
/// ```
/// use torque_pipeline::processors::batch::parse_scaling_factors;
///
/// assert_eq!(parse_scaling_factors(" 1.5, 2 ,0.8").unwrap(), vec![1.5, 2.0, 0.8]);
/// ```
pub fn parse_scaling_factors(input: &str) -> Result<Vec<f64>, BatchError> {
    input
        .split(',')
        .enumerate()
        .map(|(i, raw)| {
            let value = raw.trim();
            value
                .parse::<f64>()
                .ok()
                .filter(|factor| factor.is_finite())
                .ok_or_else(|| BatchError::InvalidScalingFactor {
                    value: value.to_string(),
                    position: i + 1,
                })
        })
        .collect()
}

/// Pair each station directory with its scaling factor.
///
/// Factors are matched to stations in the sorted order of
/// [`find_stations`]. The counts must agree exactly.
pub fn pair_stations(station_dirs: &[PathBuf], factors: &[f64]) -> Result<Vec<Station>, BatchError> {
    if station_dirs.len() != factors.len() {
        return Err(BatchError::ScalingMismatch {
            stations: station_dirs.len(),
            factors: factors.len(),
        });
    }

    Ok(station_dirs
        .iter()
        .zip(factors.iter())
        .map(|(dir, &scaling_factor)| Station {
            name: station_name(dir),
            input_dir: dir.clone(),
            scaling_factor,
        })
        .collect())
}

/// Discover the stations under `base_dir` and pair them with `factors`.
pub fn discover_stations(base_dir: &Path, factors: &[f64]) -> Result<Vec<Station>, BatchError> {
    let station_dirs = find_stations(base_dir)?;
    if station_dirs.is_empty() {
        return Err(BatchError::NoStations(base_dir.to_path_buf()));
    }
    pair_stations(&station_dirs, factors)
}

/// Default output root: an `Output` folder next to the base input directory.
pub fn default_output_root(base_dir: &Path) -> PathBuf {
    base_dir
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("Output")
}

/// Output directory for one station.
pub fn station_output_dir(output_root: &Path, station: &str) -> PathBuf {
    output_root.join(format!("ASG_Formatted_{}_Torque_Study", station))
}

/// Output file name for the `number`-th (1-based) file of a station.
pub fn output_file_name(station: &str, number: usize) -> String {
    format!("{}_TORQUE_CSV_{}.csv", station, number)
}

/// Work item for one file conversion.
#[derive(Clone)]
struct ConversionTask {
    src: PathBuf,
    dest: PathBuf,
}

/// Convert the exports of one station.
///
/// `on_file` is called once per attempted file, in completion order, with the
/// input path and whether it succeeded.
pub fn process_station<F>(
    station: &Station,
    output_root: &Path,
    config: &PipelineConfig,
    on_file: F,
) -> StationReport
where
    F: Fn(&Path, bool) + Sync,
{
    let batch: &BatchConfig = &config.batch;
    let output_dir = station_output_dir(output_root, &station.name);

    let inputs = match find_input_files(&station.input_dir, &batch.extension) {
        Ok(files) => files,
        Err(e) => {
            error!("Station {}: {}", station.name, e);
            return StationReport::skipped(station, output_dir, e.to_string());
        }
    };

    if inputs.len() < batch.required_files {
        let e = BatchError::InsufficientFiles {
            station: station.name.clone(),
            found: inputs.len(),
            required: batch.required_files,
            extension: batch.extension.trim_start_matches('.').to_string(),
        };
        warn!("{}", e);
        return StationReport::skipped(station, output_dir, e.to_string());
    }

    if let Err(source) = fs::create_dir_all(&output_dir) {
        let e = BatchError::CreateOutputDir {
            path: output_dir.clone(),
            source,
        };
        error!("Station {}: {}", station.name, e);
        return StationReport::skipped(station, output_dir, e.to_string());
    }

    let tasks: Vec<ConversionTask> = inputs
        .into_iter()
        .take(batch.required_files)
        .enumerate()
        .map(|(i, src)| ConversionTask {
            src,
            dest: output_dir.join(output_file_name(&station.name, i + 1)),
        })
        .collect();

    info!(
        "Station {}: converting {} files with scaling factor {}",
        station.name,
        tasks.len(),
        station.scaling_factor
    );

    let run_task = |task: &ConversionTask| {
        let result = convert_file(&task.src, &task.dest, station.scaling_factor, &config.format);
        match &result {
            Ok(summary) => info!(
                "Processed {} and saved to {} ({} nullified)",
                task.src.display(),
                task.dest.display(),
                summary.nullified
            ),
            Err(e) => error!("Failed to convert {}: {:#}", task.src.display(), e),
        }
        on_file(&task.src, result.is_ok());
        result.map_err(|e| FileFailure {
            input: task.src.clone(),
            reason: format!("{:#}", e),
        })
    };

    // Output names are fixed before dispatch, so both paths write the same files.
    let results: Vec<Result<FileSummary, FileFailure>> = if batch.parallel {
        tasks.par_iter().map(run_task).collect()
    } else {
        tasks.iter().map(run_task).collect()
    };

    let mut converted = Vec::with_capacity(results.len());
    let mut failed = Vec::new();
    for result in results {
        match result {
            Ok(summary) => converted.push(summary),
            Err(failure) => failed.push(failure),
        }
    }

    info!("File formatting complete for station {}", station.name);

    StationReport {
        station: station.name.clone(),
        output_dir,
        outcome: StationOutcome::Processed { converted, failed },
    }
}

/// Convert every station in turn.
///
/// Stations are processed sequentially; a skipped or partially failed station
/// never stops the ones after it.
pub fn run_batch<F>(
    stations: &[Station],
    output_root: &Path,
    config: &PipelineConfig,
    on_file: F,
) -> BatchReport
where
    F: Fn(&Path, bool) + Sync,
{
    let stations = stations
        .iter()
        .map(|station| process_station(station, output_root, config, &on_file))
        .collect();

    BatchReport { stations }
}

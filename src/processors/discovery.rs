//! Station and input file discovery.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while scanning directories.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// List the station subdirectories of a base input directory.
///
/// Only immediate subdirectories count. The result is sorted by name so the
/// order shown to the operator matches the order scaling factors are paired.
///
/// # Returns
///
/// Paths of the station directories.
pub fn find_stations(base_dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !base_dir.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(base_dir.to_path_buf()));
    }

    let entries = fs::read_dir(base_dir).map_err(|e| DiscoveryError::ReadDir {
        path: base_dir.to_path_buf(),
        source: e,
    })?;

    let mut stations: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();

    stations.sort();
    Ok(stations)
}

/// Check whether a path carries the given extension (case-insensitive).
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(extension.trim_start_matches('.')))
        .unwrap_or(false)
}

/// Find the eligible input files of one station, sorted by name.
///
/// # Arguments
///
/// * `station_dir` - Station directory to scan (not recursive)
/// * `extension` - Extension of eligible files, with or without the dot
pub fn find_input_files(station_dir: &Path, extension: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let entries = fs::read_dir(station_dir).map_err(|e| DiscoveryError::ReadDir {
        path: station_dir.to_path_buf(),
        source: e,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_extension(path, extension))
        .collect();

    files.sort();
    Ok(files)
}

/// Name of a station as shown to the operator and used in output names.
pub fn station_name(station_dir: &Path) -> String {
    station_dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| station_dir.display().to_string())
}

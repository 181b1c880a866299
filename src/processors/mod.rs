//! Data processing modules.

pub mod batch;
pub mod conversion;
pub mod discovery;

// Re-export key types for convenience
pub use batch::{
    discover_stations, parse_scaling_factors, process_station, run_batch, BatchError, BatchReport,
    Station, StationOutcome, StationReport,
};
pub use conversion::{build_curve, convert_file, ConversionError, FileSummary};
pub use discovery::{find_input_files, find_stations, DiscoveryError};

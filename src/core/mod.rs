//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;

pub use loaders::{load_asg_csv, load_sample_rows, LoaderError, RawSampleRows, TorqueAngleCurve};
pub use writers::{write_asg_csv, AsgRow, WriteError};

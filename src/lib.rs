//! Conversion of SD550 bolt-tightening driver exports to ASG format.
//!
//! This crate provides tools for:
//! - Extracting the torque and encoder sample rows from raw `.nwd` exports
//! - Restoring time order and rebuilding a multi-revolution rotation angle
//! - Removing torque overflow samples and applying per-station scaling
//! - Writing ASG-formatted CSVs, one per export, for whole station batches
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use torque_pipeline::{config::FormatConfig, processors::conversion::convert_file};
//!
//! let summary = convert_file(
//!     Path::new("ST10/run_001.nwd"),
//!     Path::new("Output/ST10_TORQUE_CSV_1.csv"),
//!     1.25,
//!     &FormatConfig::default(),
//! )
//! .unwrap();
//! println!("{} samples, {} nullified", summary.samples, summary.nullified);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{BatchConfig, FormatConfig, PipelineConfig};
pub use self::core::loaders::{RawSampleRows, TorqueAngleCurve};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

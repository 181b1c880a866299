//! Command-line interface for the torque pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{INPUT_EXTENSION, REQUIRED_FILES_PER_STATION};
use crate::processors::batch::{
    default_output_root, discover_stations, parse_scaling_factors, run_batch, BatchReport,
    StationOutcome,
};
use crate::processors::conversion::FileSummary;
use crate::processors::discovery::{find_stations, station_name};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "torque-pipeline")]
#[command(about = "Convert SD550 torque/angle exports to ASG format", version)]
pub struct Cli {
    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every station subdirectory of a base input directory
    Batch {
        /// Base input directory (prompted for if omitted)
        base_dir: Option<PathBuf>,
        /// Comma-separated scaling factors, one per station in listed order
        /// (prompted for if omitted)
        #[arg(short, long)]
        scaling_factors: Option<String>,
        /// Output root (defaults to an Output folder next to the base directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Extension of raw driver exports
        #[arg(long, default_value = INPUT_EXTENSION)]
        extension: String,
        /// Files each station must provide; exactly this many are converted
        #[arg(long, default_value_t = REQUIRED_FILES_PER_STATION)]
        required_files: usize,
        /// Convert the files of a station in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Convert a single driver export
    Convert {
        /// Raw driver export
        input: PathBuf,
        /// ASG CSV to write
        output: PathBuf,
        /// Scaling factor applied to raw torque samples
        #[arg(short, long, default_value_t = 1.0)]
        scaling_factor: f64,
    },

    /// Plot torque against angle from an ASG CSV (PNG)
    Plot {
        /// ASG CSV file
        asg_file: PathBuf,
        /// Output PNG file path (defaults to same name as input with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Maximum number of samples to plot (subsamples if exceeded)
        #[arg(long, default_value_t = 5000)]
        max_points: usize,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}").unwrap());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar over a known number of files
fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:>20} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap()
            .progress_chars("=> "),
    );
    pb.set_message(message.to_string());
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Ask the operator for one line of input.
fn prompt(message: &str) -> io::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    match cli.command {
        Commands::Batch {
            base_dir,
            scaling_factors,
            output_dir,
            extension,
            required_files,
            parallel,
        } => {
            let mut config = PipelineConfig::default();
            config.batch.extension = extension;
            config.batch.required_files = required_files;
            config.batch.parallel = parallel;
            cmd_batch(base_dir, scaling_factors, output_dir, &config);
        }
        Commands::Convert {
            input,
            output,
            scaling_factor,
        } => {
            cmd_convert(&input, &output, scaling_factor, &PipelineConfig::default());
        }
        Commands::Plot {
            asg_file,
            output,
            max_points,
        } => {
            cmd_plot(&asg_file, output, max_points);
        }
    }
}

fn cmd_batch(
    base_dir: Option<PathBuf>,
    scaling_factors: Option<String>,
    output_dir: Option<PathBuf>,
    config: &PipelineConfig,
) {
    let start = Instant::now();

    let base_dir = match base_dir {
        Some(dir) => dir,
        None => match prompt("Enter the base input directory: ") {
            Ok(line) => PathBuf::from(line),
            Err(e) => {
                error!("Failed to read base input directory: {}", e);
                std::process::exit(1);
            }
        },
    };

    let station_dirs = match find_stations(&base_dir) {
        Ok(dirs) if !dirs.is_empty() => dirs,
        Ok(_) => {
            error!("No station subdirectories found in {}", base_dir.display());
            std::process::exit(1);
        }
        Err(e) => {
            error!("No station subdirectories found: {}", e);
            std::process::exit(1);
        }
    };

    println!("Found station subdirectories:");
    for (i, dir) in station_dirs.iter().enumerate() {
        println!("  {}. {}", i + 1, station_name(dir));
    }
    println!();

    let factors_line = match scaling_factors {
        Some(line) => line,
        None => match prompt(
            "Enter scaling factors for each station separated by commas, in the order listed above: ",
        ) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read scaling factors: {}", e);
                std::process::exit(1);
            }
        },
    };

    // Configuration-shape errors abort before any file is touched.
    let stations = match parse_scaling_factors(&factors_line)
        .and_then(|factors| discover_stations(&base_dir, &factors))
    {
        Ok(stations) => stations,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let output_root = output_dir.unwrap_or_else(|| default_output_root(&base_dir));
    info!("Writing output under {}", output_root.display());

    let total = (stations.len() * config.batch.required_files) as u64;
    let pb = create_progress_bar(total, "Converting");

    let report = run_batch(&stations, &output_root, config, |path, ok| {
        if !ok {
            pb.println(format!("Failed: {}", path.display()));
        }
        pb.inc(1);
    });

    pb.finish_and_clear();

    print_station_reports(&report);

    print_summary(
        "Batch Conversion Complete",
        &[
            ("Input directory", base_dir.display().to_string()),
            ("Output directory", output_root.display().to_string()),
            ("Stations", stations.len().to_string()),
            ("Stations skipped", report.skipped_count().to_string()),
            ("Files converted", report.converted_count().to_string()),
            ("Files failed", report.failed_count().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn print_station_reports(report: &BatchReport) {
    for station in &report.stations {
        match &station.outcome {
            StationOutcome::Processed { converted, failed } => {
                for line in converted.iter().flat_map(file_summary_lines) {
                    println!("{}", line);
                }
                println!(
                    "Station {}: {} converted, {} failed -> {}",
                    station.station,
                    converted.len(),
                    failed.len(),
                    station.output_dir.display()
                );
                for failure in failed {
                    println!("  ! {}: {}", failure.input.display(), failure.reason);
                }
            }
            StationOutcome::Skipped { reason } => {
                warn!("Station {} skipped", station.station);
                println!("Station {}: skipped ({})", station.station, reason);
            }
        }
    }
}

fn format_peak(peak: Option<f64>) -> String {
    peak.map_or_else(|| "-".to_string(), |t| t.to_string())
}

/// Per-file lines shown after a batch, whatever the log level.
fn file_summary_lines(summary: &FileSummary) -> [String; 2] {
    [
        format!(
            "Processed {} and saved to {}",
            summary.input.display(),
            summary.output.display()
        ),
        format!(
            "  Nullified values: {}  Max value: {}",
            summary.nullified,
            format_peak(summary.peak_torque)
        ),
    ]
}

fn cmd_convert(input: &Path, output: &Path, scaling_factor: f64, config: &PipelineConfig) {
    use crate::processors::conversion;

    let start = Instant::now();

    println!("Converting single file...");
    println!("Input: {}", input.display());
    println!("Output: {}", output.display());

    let spinner = create_spinner("Converting to ASG format...");

    match conversion::convert_file(input, output, scaling_factor, &config.format) {
        Ok(summary) => {
            spinner.finish_and_clear();

            print_summary(
                "Conversion Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output file", output.display().to_string()),
                    ("Samples", summary.samples.to_string()),
                    ("Nullified values", summary.nullified.to_string()),
                    ("Max torque", format_peak(summary.peak_torque)),
                    ("Scaling factor", scaling_factor.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Conversion failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_plot(asg_file: &Path, output: Option<PathBuf>, max_points: usize) {
    use crate::core::loaders;
    use crate::visualization;

    let start = Instant::now();

    // Determine output path (default to same name as input with .png extension)
    let output_path = output.unwrap_or_else(|| asg_file.with_extension("png"));

    println!("Plotting torque curve...");
    println!("Input: {}", asg_file.display());
    println!("Output: {}", output_path.display());

    let spinner = create_spinner("Loading ASG file...");

    let curve = match loaders::load_asg_csv(asg_file) {
        Ok(c) => c,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load ASG file: {}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Generating plot...");

    match visualization::plot_torque_curve(&output_path, &curve, max_points) {
        Ok(()) => {
            spinner.finish_and_clear();

            print_summary(
                "Plot Complete",
                &[
                    ("Input file", asg_file.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    ("Samples", curve.len().to_string()),
                    ("Max torque", format_peak(curve.peak_torque())),
                    (
                        "Final angle",
                        curve.final_angle().map_or_else(|| "-".to_string(), |a| a.to_string()),
                    ),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Plot failed: {}", e);
            std::process::exit(1);
        }
    }
}

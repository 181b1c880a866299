//! Visualization of converted tightening curves.
//!
//! Renders torque against compounded angle as a PNG line chart using the
//! plotters library.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::loaders::TorqueAngleCurve;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Empty curve")]
    EmptyCurve,

    #[error("Curve is misaligned: {torque_len} torque samples, {angle_len} angle samples")]
    Misaligned { torque_len: usize, angle_len: usize },
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1920;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1080;

/// Torque trace color.
const CURVE_COLOR: RGBColor = RGBColor(55, 126, 184);

/// Plot torque (y) against total angle (x) and save as PNG.
///
/// Axis labels are not drawn so no system fonts are needed.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `curve` - Converted torque/angle curve
/// * `max_points` - Maximum number of samples to plot (subsamples if exceeded)
pub fn plot_torque_curve(output_path: &Path, curve: &TorqueAngleCurve, max_points: usize) -> Result<()> {
    if curve.is_empty() {
        return Err(VisualizationError::EmptyCurve);
    }
    if !curve.is_aligned() {
        return Err(VisualizationError::Misaligned {
            torque_len: curve.torque.len(),
            angle_len: curve.angle.len(),
        });
    }

    let points = subsample_points(curve, max_points);

    let (x_min, x_max, y_min, y_max) = compute_bounds(&points);
    let x_padding = (x_max - x_min) * 0.05;
    let y_padding = (y_max - y_min) * 0.05;

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT)).into_drawing_area();

    root.fill(&WHITE).map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(
            (x_min - x_padding)..(x_max + x_padding),
            (y_min - y_padding)..(y_max + y_padding),
        )
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(0)
        .y_labels(0)
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .draw_series(LineSeries::new(points, CURVE_COLOR.stroke_width(2)))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    root.present().map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Pick at most `max_points` (angle, torque) pairs at an even stride.
fn subsample_points(curve: &TorqueAngleCurve, max_points: usize) -> Vec<(f64, f64)> {
    let n = curve.len();
    let max_points = max_points.max(1);
    let step = if n > max_points { n.div_ceil(max_points) } else { 1 };

    (0..n)
        .step_by(step)
        .map(|i| (curve.angle[i], curve.torque[i]))
        .collect()
}

/// Compute the bounds (min/max) for x and y coordinates.
fn compute_bounds(points: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for &(x, y) in points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}

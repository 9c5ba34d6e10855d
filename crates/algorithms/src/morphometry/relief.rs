//! Elevation and slope statistics over a watershed.

use crate::hydrology::{FlowPath, WatershedMask};
use crate::terrain::{slope_scaled, SlopeUnits};
use cuenca_core::raster::Raster;
use cuenca_core::{ElevationGrid, Error, Result};
use ndarray::s;
use serde::{Deserialize, Serialize};

/// Relief metrics of a watershed. Elevations come from the raw DEM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliefMetrics {
    pub elevation_min: f64,
    pub elevation_max: f64,
    pub elevation_mean: f64,
    /// Maximum minus minimum elevation
    pub relief_m: f64,
    /// Headwater minus outlet elevation along the main flow path
    pub path_relief_m: f64,
    /// Mean slope along the main flow path (m/m)
    pub path_slope: Option<f64>,
    pub path_slope_percent: Option<f64>,
    pub path_slope_degrees: Option<f64>,
    /// Mean Horn slope of cells with a complete 3x3 window
    pub mean_slope_percent: Option<f64>,
    pub mean_slope_degrees: Option<f64>,
}

/// Compute relief metrics for the cells of `mask`.
pub fn relief_metrics(dem: &ElevationGrid, mask: &WatershedMask, path: &FlowPath) -> Result<ReliefMetrics> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut count = 0usize;
    for (r, c) in mask.cells() {
        if let Some(z) = dem.elevation(r, c) {
            min = min.min(z);
            max = max.max(z);
            sum += z;
            count += 1;
        }
    }
    if count == 0 {
        let (row, col) = mask.outlet();
        return Err(Error::EmptyWatershed { row, col });
    }

    let path_slope = path.slope();
    let (mean_slope_percent, mean_slope_degrees) = mean_terrain_slope(dem, mask)?;

    Ok(ReliefMetrics {
        elevation_min: min,
        elevation_max: max,
        elevation_mean: sum / count as f64,
        relief_m: max - min,
        path_relief_m: path.relief(),
        path_slope,
        path_slope_percent: path_slope.map(|s| s * 100.0),
        path_slope_degrees: path_slope.map(|s| s.atan().to_degrees()),
        mean_slope_percent,
        mean_slope_degrees,
    })
}

/// Horn slope averaged over the mask, as (percent, degrees).
///
/// Only the mask's bounding box plus a one-cell margin is evaluated.
fn mean_terrain_slope(dem: &ElevationGrid, mask: &WatershedMask) -> Result<(Option<f64>, Option<f64>)> {
    let (rows, cols) = dem.shape();
    let (r0, c0, r1, c1) = mask.bounds();
    let top = r0.saturating_sub(1);
    let left = c0.saturating_sub(1);
    let bottom = (r1 + 2).min(rows);
    let right = (c1 + 2).min(cols);

    let window = dem
        .raster()
        .data()
        .slice(s![top..bottom, left..right])
        .to_owned();
    let mut crop = Raster::from_array(window);
    crop.set_nodata(Some(f64::NAN));

    let gradient = slope_scaled(&crop, dem.cell_width(), dem.cell_height(), SlopeUnits::Ratio)?;

    let values: Vec<f64> = mask
        .cells()
        .map(|(r, c)| gradient.data()[(r - top, c - left)])
        .filter(|g| !g.is_nan())
        .collect();
    if values.is_empty() {
        return Ok((None, None));
    }

    let n = values.len() as f64;
    let percent = values.iter().sum::<f64>() / n * 100.0;
    let degrees = values.iter().map(|g| g.atan().to_degrees()).sum::<f64>() / n;
    Ok((Some(percent), Some(degrees)))
}

//! Slope calculation from DEMs
//!
//! Calculates the rate of change of elevation using the Horn (1981) method,
//! which uses a 3x3 neighborhood to compute partial derivatives.

use crate::maybe_rayon::collect_rows;
use cuenca_core::raster::Raster;
use cuenca_core::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Units for slope output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeUnits {
    /// Degrees (0-90)
    #[default]
    Degrees,
    /// Percent (0-infinity, typically 0-100+)
    Percent,
    /// Rise over run (m/m)
    Ratio,
    /// Radians (0-π/2)
    Radians,
}

impl SlopeUnits {
    fn from_gradient(self, gradient: f64) -> f64 {
        match self {
            SlopeUnits::Degrees => gradient.atan().to_degrees(),
            SlopeUnits::Percent => gradient * 100.0,
            SlopeUnits::Ratio => gradient,
            SlopeUnits::Radians => gradient.atan(),
        }
    }
}

/// Horn (1981) slope over a 3x3 neighborhood:
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
///
/// dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * cell_width)
/// dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * cell_height)
/// slope = atan(sqrt(dz/dx² + dz/dy²))
///
/// Cell dimensions are metric, so geographic grids pass their converted
/// sizes. Edge cells and cells whose 3x3 window touches no-data are NaN.
pub fn slope_scaled(dem: &Raster<f64>, cell_width: f64, cell_height: f64, units: SlopeUnits) -> Result<Raster<f64>> {
    if !(cell_width > 0.0 && cell_height > 0.0) {
        return Err(Error::InvalidParameter {
            name: "cell_size",
            value: format!("{}x{}", cell_width, cell_height),
            reason: "cell dimensions must be positive".into(),
        });
    }

    let (rows, cols) = dem.shape();
    let data = dem.data();
    let eight_w = 8.0 * cell_width;
    let eight_h = 8.0 * cell_height;

    let output_data: Vec<f64> = collect_rows(rows, |row| {
        let mut row_data = vec![f64::NAN; cols];

        // Need a full 3x3 neighborhood
        if row == 0 || row + 1 >= rows {
            return row_data;
        }

        for col in 1..cols.saturating_sub(1) {
            let z = |dr: usize, dc: usize| data[(row + dr - 1, col + dc - 1)];
            let (a, b, c) = (z(0, 0), z(0, 1), z(0, 2));
            let (d, e, f) = (z(1, 0), z(1, 1), z(1, 2));
            let (g, h, i) = (z(2, 0), z(2, 1), z(2, 2));

            if [a, b, c, d, e, f, g, h, i].iter().any(|v| dem.is_nodata(*v)) {
                continue;
            }

            // Horn's method
            let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / eight_w;
            let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / eight_h;

            row_data[col] = units.from_gradient(dz_dx.hypot(dz_dy));
        }

        row_data
    });

    let array = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;
    dem.with_data(array, Some(f64::NAN))
}

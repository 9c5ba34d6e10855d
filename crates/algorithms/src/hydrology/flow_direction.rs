//! D8 flow direction algorithm
//!
//! Calculates the direction of flow from each cell to its steepest
//! downslope neighbor using the D8 (deterministic eight-node) method.
//!
//! Flow direction encoding:
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! 0 = no outflow (no-data or unresolved pit), 1-8 = direction to the
//! steepest neighbor. Equal drops resolve to the lowest code.

use crate::maybe_rayon::collect_rows;
use cuenca_core::raster::{d8, Raster};
use cuenca_core::{Error, Result};
use ndarray::Array2;

/// Calculate D8 flow direction from a DEM whose map units are meters.
///
/// The input DEM should be hydrologically conditioned (see
/// [`priority_flood`](super::priority_flood)) so every interior cell has a
/// lower neighbor.
pub fn flow_direction(dem: &Raster<f64>) -> Result<Raster<u8>> {
    let (w, h) = dem.transform().cell_dimensions();
    flow_direction_scaled(dem, w, h)
}

/// Calculate D8 flow direction with explicit metric cell dimensions.
///
/// Drops are `(z - z_n) / distance` with the step length taken from the cell
/// width (E/W), height (N/S) or their hypotenuse (diagonals). A valid cell
/// with no lower neighbor that sits on the border or next to no-data points
/// at the first off-grid or no-data neighbor, marking a grid-edge outlet.
pub fn flow_direction_scaled(dem: &Raster<f64>, cell_width: f64, cell_height: f64) -> Result<Raster<u8>> {
    if !(cell_width > 0.0 && cell_height > 0.0 && cell_width.is_finite() && cell_height.is_finite()) {
        return Err(Error::InvalidParameter {
            name: "cell_size",
            value: format!("{}x{}", cell_width, cell_height),
            reason: "cell dimensions must be positive and finite".into(),
        });
    }

    let (rows, cols) = dem.shape();
    let data = dem.data();

    let output_data: Vec<u8> = collect_rows(rows, |row| {
        let mut row_data = vec![d8::NO_FLOW; cols];

        for (col, out) in row_data.iter_mut().enumerate() {
            if !dem.is_valid_at(row, col) {
                continue;
            }
            let center = data[(row, col)];

            let mut max_drop = 0.0_f64;
            let mut best_dir = d8::NO_FLOW;
            let mut edge_dir = d8::NO_FLOW;

            for (idx, &(dr, dc)) in d8::OFFSETS.iter().enumerate() {
                let dir = d8::code(idx);
                let Some((nr, nc)) = d8::offset(row, col, dr, dc, rows, cols) else {
                    if edge_dir == d8::NO_FLOW {
                        edge_dir = dir;
                    }
                    continue;
                };
                if !dem.is_valid_at(nr, nc) {
                    if edge_dir == d8::NO_FLOW {
                        edge_dir = dir;
                    }
                    continue;
                }

                let distance = d8::step_length(dir, cell_width, cell_height);
                let drop = (center - data[(nr, nc)]) / distance;

                if drop > max_drop {
                    max_drop = drop;
                    best_dir = dir;
                }
            }

            *out = if best_dir != d8::NO_FLOW { best_dir } else { edge_dir };
        }

        row_data
    });

    let array = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;
    dem.with_data(array, Some(d8::NO_FLOW))
}

//! Outlet snapping
//!
//! A user-picked pour point rarely lands exactly on the channel cell. The
//! resolver searches a square window around the requested cell for the cell
//! with the largest flow accumulation and uses that as the outlet.

use super::flow_model::FlowModel;
use super::stream_network::ChannelThreshold;
use cuenca_core::raster::SquareWindow;
use cuenca_core::{Coordinate, ElevationGrid, Error, Result};
use serde::{Deserialize, Serialize};

/// Parameters for outlet snapping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapParams {
    /// Half-width of the square search window, in cells
    pub radius: usize,
    /// Accumulation (cells) the snapped cell must reach. `None` uses the
    /// default channel-initiation threshold for the grid's cell area.
    pub min_accumulation: Option<f64>,
}

impl Default for SnapParams {
    fn default() -> Self {
        Self {
            radius: 5,
            min_accumulation: None,
        }
    }
}

/// Where the user clicked and where the outlet ended up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletPoint {
    pub requested: Coordinate,
    /// Requested position in the grid's map reference
    pub requested_xy: (f64, f64),
    pub requested_cell: (usize, usize),
    pub cell: (usize, usize),
    /// Upstream cell count at the snapped cell
    pub accumulation: f64,
    pub snap_distance_cells: f64,
    pub snap_distance_m: f64,
    /// Map coordinates of the snapped cell center
    pub x: f64,
    pub y: f64,
}

impl OutletPoint {
    pub fn moved(&self) -> bool {
        self.cell != self.requested_cell
    }
}

/// Convert a coordinate to a cell and snap it to the strongest nearby channel.
///
/// Candidates are the valid cells of the `(2r+1)²` window; the largest
/// accumulation wins, ties go to the cell nearest the requested one (metric
/// distance), then to row-major order.
///
/// # Errors
/// - `OutletOutOfBounds` when the coordinate is outside the grid extent
/// - `NoChannelNearby` when the best candidate is below `min_accumulation`
pub fn resolve_outlet(
    dem: &ElevationGrid,
    flow: &FlowModel,
    coordinate: &Coordinate,
    params: &SnapParams,
) -> Result<OutletPoint> {
    let requested_xy = dem.to_grid_xy(coordinate)?;
    let (row, col) = dem.locate(coordinate)?;
    let (rows, cols) = dem.shape();

    let required = params
        .min_accumulation
        .unwrap_or_else(|| ChannelThreshold::default().to_cells(dem.cell_area()));

    let metric = |r: usize, c: usize| {
        let dy = (r as f64 - row as f64) * dem.cell_height();
        let dx = (c as f64 - col as f64) * dem.cell_width();
        dx.hypot(dy)
    };

    // (accumulation, distance, cell); row-major iteration keeps the first of equals
    let mut best: Option<(f64, f64, (usize, usize))> = None;
    for (r, c) in SquareWindow::new(params.radius).cells_around(row, col, rows, cols) {
        let Some(acc) = flow.accumulation(r, c) else {
            continue;
        };
        let dist = metric(r, c);
        let better = match best {
            None => true,
            Some((best_acc, best_dist, _)) => acc > best_acc || (acc == best_acc && dist < best_dist),
        };
        if better {
            best = Some((acc, dist, (r, c)));
        }
    }

    let (accumulation, snap_distance_m, cell) = match best {
        Some(found) if found.0 >= required => found,
        other => {
            return Err(Error::NoChannelNearby {
                row,
                col,
                radius: params.radius,
                best: other.map_or(0.0, |b| b.0),
                required,
            })
        }
    };

    let snap_distance_cells = (cell.0 as f64 - row as f64).hypot(cell.1 as f64 - col as f64);
    let (x, y) = dem.cell_center(cell.0, cell.1);

    Ok(OutletPoint {
        requested: *coordinate,
        requested_xy,
        requested_cell: (row, col),
        cell,
        accumulation,
        snap_distance_cells,
        snap_distance_m,
        x,
        y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_model::FlowModelParams;
    use cuenca_core::GeoTransform;

    /// 11x11 plane tilted south with a channel carved down column 5
    fn channel_grid() -> ElevationGrid {
        let rows: Vec<Vec<f64>> = (0..11)
            .map(|r| {
                (0..11)
                    .map(|c| 200.0 - r as f64 * 5.0 + (c as f64 - 5.0).abs() * 3.0)
                    .collect()
            })
            .collect();
        ElevationGrid::from_rows(rows, GeoTransform::new(0.0, 110.0, 10.0, -10.0), None).unwrap()
    }

    fn model(dem: &ElevationGrid) -> FlowModel {
        FlowModel::build(dem, &FlowModelParams::default()).unwrap()
    }

    #[test]
    fn test_snaps_to_channel() {
        let dem = channel_grid();
        let flow = model(&dem);
        // Cell (8, 3), two columns west of the channel
        let coord = Coordinate::Projected { x: 35.0, y: 25.0 };
        let params = SnapParams {
            radius: 2,
            min_accumulation: Some(1.0),
        };

        let outlet = resolve_outlet(&dem, &flow, &coord, &params).unwrap();
        assert_eq!(outlet.requested_cell, (8, 3));
        assert_eq!(outlet.cell.1, 5);
        assert!(outlet.moved());
        assert!(outlet.snap_distance_m >= 20.0);
        assert_eq!(outlet.accumulation, flow.accumulation(outlet.cell.0, outlet.cell.1).unwrap());
    }

    #[test]
    fn test_radius_zero_keeps_cell() {
        let dem = channel_grid();
        let flow = model(&dem);
        let coord = Coordinate::Projected { x: 35.0, y: 25.0 };
        let params = SnapParams {
            radius: 0,
            min_accumulation: Some(1.0),
        };

        let outlet = resolve_outlet(&dem, &flow, &coord, &params).unwrap();
        assert_eq!(outlet.cell, (8, 3));
        assert_eq!(outlet.snap_distance_cells, 0.0);
    }

    #[test]
    fn test_out_of_bounds() {
        let dem = channel_grid();
        let flow = model(&dem);
        let coord = Coordinate::Projected { x: -500.0, y: 25.0 };

        let err = resolve_outlet(&dem, &flow, &coord, &SnapParams::default()).unwrap_err();
        assert!(matches!(err, Error::OutletOutOfBounds { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_threshold_not_met() {
        let dem = channel_grid();
        let flow = model(&dem);
        let coord = Coordinate::Projected { x: 55.0, y: 105.0 };
        let params = SnapParams {
            radius: 1,
            min_accumulation: Some(1000.0),
        };

        match resolve_outlet(&dem, &flow, &coord, &params) {
            Err(Error::NoChannelNearby { best, required, .. }) => {
                assert!(best < required);
                assert_eq!(required, 1000.0);
            }
            other => panic!("expected NoChannelNearby, got {:?}", other),
        }
    }
}

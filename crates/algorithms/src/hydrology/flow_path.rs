//! Longest flow path (main axial length) of a watershed.

use super::flow_model::FlowModel;
use super::watershed::WatershedMask;
use cuenca_core::raster::d8;
use cuenca_core::{ElevationGrid, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A flow path from a headwater cell down to the outlet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowPath {
    /// Cells in flow order, headwater first, outlet last
    pub cells: Vec<(usize, usize)>,
    /// Length along D8 steps, in meters
    pub length_m: f64,
    /// Raw DEM elevation of each cell
    pub elevations: Vec<f64>,
    /// Straight-line distance between the first and last cell centers
    pub straight_length_m: f64,
}

impl FlowPath {
    pub fn headwater(&self) -> Option<(usize, usize)> {
        self.cells.first().copied()
    }

    /// Elevation drop from headwater to outlet
    pub fn relief(&self) -> f64 {
        match (self.elevations.first(), self.elevations.last()) {
            (Some(top), Some(bottom)) => top - bottom,
            _ => 0.0,
        }
    }

    /// Mean slope along the path (m/m), `None` for a zero-length path
    pub fn slope(&self) -> Option<f64> {
        (self.length_m > 0.0).then(|| self.relief() / self.length_m)
    }

    /// Path length over straight-line length, `None` when the ends coincide
    pub fn sinuosity(&self) -> Option<f64> {
        (self.straight_length_m > 0.0).then(|| self.length_m / self.straight_length_m)
    }
}

/// Find the masked cell with the longest flow distance to the outlet and
/// return its path.
///
/// Distances are propagated upstream from the outlet along the D8 tree; the
/// farthest cell wins, ties going to the first in row-major order.
pub fn longest_flow_path(dem: &ElevationGrid, flow: &FlowModel, mask: &WatershedMask) -> Result<FlowPath> {
    let (rows, cols) = flow.shape();
    let outlet = mask.outlet();
    let (w, h) = (flow.cell_width(), flow.cell_height());

    let mut distance = Array2::<f64>::from_elem((rows, cols), f64::NAN);
    distance[outlet] = 0.0;
    let mut queue = VecDeque::from([outlet]);
    while let Some((r, c)) = queue.pop_front() {
        for (ur, uc) in flow.upstream(r, c) {
            if !mask.contains(ur, uc) || !distance[(ur, uc)].is_nan() {
                continue;
            }
            distance[(ur, uc)] = distance[(r, c)] + d8::step_length(flow.direction(ur, uc), w, h);
            queue.push_back((ur, uc));
        }
    }

    let mut head = outlet;
    let mut longest = 0.0;
    for (r, c) in mask.cells() {
        let d = distance[(r, c)];
        if d > longest {
            longest = d;
            head = (r, c);
        }
    }

    let mut cells = vec![head];
    let mut cur = head;
    while cur != outlet {
        match flow.downstream(cur.0, cur.1) {
            Some(next) if mask.contains(next.0, next.1) => {
                cells.push(next);
                cur = next;
            }
            _ => break,
        }
    }

    let elevations = cells
        .iter()
        .map(|&(r, c)| dem.elevation(r, c).unwrap_or(f64::NAN))
        .collect();

    let dx = (head.1 as f64 - outlet.1 as f64) * w;
    let dy = (head.0 as f64 - outlet.0 as f64) * h;

    Ok(FlowPath {
        cells,
        length_m: longest,
        elevations,
        straight_length_m: dx.hypot(dy),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_model::FlowModelParams;
    use crate::hydrology::watershed::trace_watershed;
    use approx::assert_relative_eq;
    use cuenca_core::GeoTransform;

    #[test]
    fn test_straight_channel() {
        // 6x3 plane draining south along the middle column
        let rows: Vec<Vec<f64>> = (0..6)
            .map(|r| (0..3).map(|c| 100.0 - r as f64 * 10.0 + (c as f64 - 1.0).abs() * 20.0).collect())
            .collect();
        let dem = ElevationGrid::from_rows(rows, GeoTransform::new(0.0, 60.0, 10.0, -10.0), None).unwrap();
        let flow = FlowModel::build(&dem, &FlowModelParams::default()).unwrap();
        let ws = trace_watershed(&flow, (5, 1)).unwrap();

        let path = longest_flow_path(&dem, &flow, &ws).unwrap();
        assert_eq!(path.cells.last(), Some(&(5, 1)));
        assert_eq!(path.cells.len(), path.elevations.len());
        // From a top corner: one diagonal then four straight steps
        assert_relative_eq!(path.length_m, 10.0 * 2f64.sqrt() + 40.0, epsilon = 1e-9);
        assert_eq!(path.headwater(), Some((0, 0)));
        assert!(path.sinuosity().unwrap() >= 1.0);
        assert!(path.relief() > 0.0);
    }

    #[test]
    fn test_single_cell_path() {
        let rows = vec![vec![5.0, 6.0], vec![7.0, 8.0]];
        let dem = ElevationGrid::from_rows(rows, GeoTransform::new(0.0, 20.0, 10.0, -10.0), None).unwrap();
        let flow = FlowModel::build(&dem, &FlowModelParams::default()).unwrap();
        let ws = trace_watershed(&flow, (1, 1)).unwrap();

        let path = longest_flow_path(&dem, &flow, &ws).unwrap();
        assert_eq!(path.cells, vec![(1, 1)]);
        assert_eq!(path.length_m, 0.0);
        assert_eq!(path.slope(), None);
        assert_eq!(path.sinuosity(), None);
    }
}

//! Watershed delineation
//!
//! Traces every cell draining to an outlet by walking the D8 graph upstream
//! from it (reverse breadth-first search). The result is a [`WatershedMask`]:
//! one 8-connected region that always contains its outlet.

use super::boundary::mask_polygon;
use super::flow_model::FlowModel;
use cuenca_core::raster::{d8, Raster};
use cuenca_core::{ElevationGrid, Error, Result};
use geo_types::Polygon;
use ndarray::Array2;
use std::collections::VecDeque;

/// Cells draining to one outlet
#[derive(Debug, Clone, PartialEq)]
pub struct WatershedMask {
    mask: Array2<bool>,
    outlet: (usize, usize),
    count: usize,
    /// (min_row, min_col, max_row, max_col), inclusive
    bounds: (usize, usize, usize, usize),
}

impl WatershedMask {
    pub fn outlet(&self) -> (usize, usize) {
        self.outlet
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.mask.get((row, col)).copied().unwrap_or(false)
    }

    /// Number of cells in the watershed
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn shape(&self) -> (usize, usize) {
        self.mask.dim()
    }

    pub fn as_array(&self) -> &Array2<bool> {
        &self.mask
    }

    /// Inclusive cell bounding box (min_row, min_col, max_row, max_col)
    pub fn bounds(&self) -> (usize, usize, usize, usize) {
        self.bounds
    }

    /// Masked cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (r0, c0, r1, c1) = self.bounds;
        (r0..=r1)
            .flat_map(move |r| (c0..=c1).map(move |c| (r, c)))
            .filter(move |&(r, c)| self.mask[(r, c)])
    }

    /// Whether every masked cell is reachable from the outlet through
    /// masked 8-neighbors
    pub fn is_eight_connected(&self) -> bool {
        if !self.contains(self.outlet.0, self.outlet.1) {
            return false;
        }
        let (rows, cols) = self.shape();
        let mut seen = Array2::from_elem((rows, cols), false);
        let mut queue = VecDeque::from([self.outlet]);
        seen[self.outlet] = true;
        let mut reached = 1;

        while let Some((r, c)) = queue.pop_front() {
            for (_, nr, nc) in d8::neighbors(r, c, rows, cols) {
                if self.mask[(nr, nc)] && !seen[(nr, nc)] {
                    seen[(nr, nc)] = true;
                    reached += 1;
                    queue.push_back((nr, nc));
                }
            }
        }
        reached == self.count
    }

    /// Cell sides on the watershed boundary as (horizontal, vertical) counts.
    ///
    /// Horizontal sides (top/bottom) are one cell wide, vertical sides
    /// (left/right) one cell high.
    pub fn boundary_edges(&self) -> (usize, usize) {
        let mut horizontal = 0;
        let mut vertical = 0;
        for (r, c) in self.cells() {
            if r == 0 || !self.contains(r - 1, c) {
                horizontal += 1;
            }
            if !self.contains(r + 1, c) {
                horizontal += 1;
            }
            if c == 0 || !self.contains(r, c - 1) {
                vertical += 1;
            }
            if !self.contains(r, c + 1) {
                vertical += 1;
            }
        }
        (horizontal, vertical)
    }

    pub fn boundary_edge_count(&self) -> usize {
        let (h, v) = self.boundary_edges();
        h + v
    }

    /// Boundary length in meters for the given cell dimensions
    pub fn perimeter(&self, cell_width: f64, cell_height: f64) -> f64 {
        let (h, v) = self.boundary_edges();
        h as f64 * cell_width + v as f64 * cell_height
    }

    /// 1 inside, 0 outside, georeferenced like `template`
    pub fn to_raster<T: cuenca_core::RasterElement>(&self, template: &Raster<T>) -> Result<Raster<u8>> {
        template.with_data(self.mask.mapv(u8::from), Some(0))
    }

    /// Outline in the grid's map reference
    pub fn boundary_polygon(&self, dem: &ElevationGrid) -> Polygon<f64> {
        mask_polygon(&self.mask, dem.transform())
    }
}

/// Delineate the watershed draining to `outlet`.
///
/// Starting at the outlet, each neighbor whose flow direction points into a
/// cell already in the mask joins it.
///
/// # Errors
/// `EmptyWatershed` if the outlet is outside the grid or on no-data.
pub fn trace_watershed(flow: &FlowModel, outlet: (usize, usize)) -> Result<WatershedMask> {
    let (rows, cols) = flow.shape();
    let (row, col) = outlet;
    if !flow.is_valid(row, col) {
        return Err(Error::EmptyWatershed { row, col });
    }

    let mut mask = Array2::from_elem((rows, cols), false);
    let mut queue = VecDeque::from([outlet]);
    mask[outlet] = true;
    let mut count = 1;
    let mut bounds = (row, col, row, col);

    while let Some((r, c)) = queue.pop_front() {
        for (ur, uc) in flow.upstream(r, c) {
            if mask[(ur, uc)] {
                continue;
            }
            mask[(ur, uc)] = true;
            count += 1;
            bounds = (
                bounds.0.min(ur),
                bounds.1.min(uc),
                bounds.2.max(ur),
                bounds.3.max(uc),
            );
            queue.push_back((ur, uc));
        }
    }

    Ok(WatershedMask {
        mask,
        outlet,
        count,
        bounds,
    })
}

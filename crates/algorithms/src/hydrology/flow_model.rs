//! Conditioned flow model shared by every request on a DEM.
//!
//! A [`FlowModel`] bundles the depression-filled surface, D8 directions and
//! accumulation built once per elevation grid. It is immutable after
//! construction and meant to be shared behind an `Arc`.

use super::flow_accumulation::flow_accumulation;
use super::flow_direction::flow_direction_scaled;
use super::priority_flood::{priority_flood, PriorityFloodParams};
use cuenca_core::raster::{d8, Raster};
use cuenca_core::{DemId, ElevationGrid, Result};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::debug;

/// Parameters for building a flow model
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowModelParams {
    pub fill: PriorityFloodParams,
}

/// Filled surface, D8 directions and accumulation for one DEM
#[derive(Debug, Clone)]
pub struct FlowModel {
    filled: Raster<f64>,
    directions: Raster<u8>,
    accumulation: Raster<f64>,
    cell_width: f64,
    cell_height: f64,
    dem_id: DemId,
}

impl FlowModel {
    /// Fill depressions, assign directions and accumulate.
    ///
    /// Fails with `CyclicFlow` if the directions do not form a forest, which
    /// cannot happen on a surface filled with a positive epsilon.
    pub fn build(dem: &ElevationGrid, params: &FlowModelParams) -> Result<Self> {
        let start = Instant::now();
        let filled = priority_flood(dem.raster(), params.fill)?;
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "depressions filled");

        let start = Instant::now();
        let directions = flow_direction_scaled(&filled, dem.cell_width(), dem.cell_height())?;
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "flow directions assigned");

        let start = Instant::now();
        let accumulation = flow_accumulation(&filled, &directions)?;
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "flow accumulated");

        Ok(Self {
            filled,
            directions,
            accumulation,
            cell_width: dem.cell_width(),
            cell_height: dem.cell_height(),
            dem_id: dem.id(),
        })
    }

    pub fn filled(&self) -> &Raster<f64> {
        &self.filled
    }

    pub fn directions(&self) -> &Raster<u8> {
        &self.directions
    }

    pub fn accumulation_grid(&self) -> &Raster<f64> {
        &self.accumulation
    }

    pub fn shape(&self) -> (usize, usize) {
        self.directions.shape()
    }

    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    pub fn cell_height(&self) -> f64 {
        self.cell_height
    }

    pub fn cell_area(&self) -> f64 {
        self.cell_width * self.cell_height
    }

    /// Fingerprint of the DEM this model was built from
    pub fn dem_id(&self) -> DemId {
        self.dem_id
    }

    /// Whether (row, col) is inside the grid and holds data
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.filled.is_valid_at(row, col)
    }

    /// D8 code at (row, col), `NO_FLOW` outside the grid
    pub fn direction(&self, row: usize, col: usize) -> u8 {
        self.directions
            .data()
            .get((row, col))
            .copied()
            .unwrap_or(d8::NO_FLOW)
    }

    /// Upstream cell count (inclusive) at (row, col), `None` on no-data
    pub fn accumulation(&self, row: usize, col: usize) -> Option<f64> {
        self.accumulation
            .data()
            .get((row, col))
            .copied()
            .filter(|a| !a.is_nan())
    }

    /// Valid cell that (row, col) drains into
    pub fn downstream(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        let (rows, cols) = self.shape();
        d8::target(row, col, self.direction(row, col), rows, cols)
            .filter(|&(nr, nc)| self.is_valid(nr, nc))
    }

    /// Whether a valid cell drains off the grid, into no-data or nowhere
    pub fn is_outlet(&self, row: usize, col: usize) -> bool {
        self.is_valid(row, col) && self.downstream(row, col).is_none()
    }

    /// Valid neighbors whose direction points at (row, col), in direction order
    pub fn upstream(&self, row: usize, col: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (rows, cols) = self.shape();
        d8::neighbors(row, col, rows, cols).filter_map(move |(code, nr, nc)| {
            (self.is_valid(nr, nc) && self.direction(nr, nc) == d8::opposite(code)).then_some((nr, nc))
        })
    }
}

type CacheKey = (DemId, u64);

/// LRU cache of flow models keyed by DEM fingerprint and fill parameters.
///
/// Safe to share between threads; concurrent requests for the same DEM get
/// the same `Arc<FlowModel>`.
pub struct FlowModelCache {
    inner: Mutex<LruCache<CacheKey, Arc<FlowModel>>>,
}

impl FlowModelCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the cached model for `dem`, building it on a miss.
    ///
    /// The model is built without holding the lock, so two threads missing at
    /// once may both build; the first insert wins and both receive it.
    pub fn get_or_build(&self, dem: &ElevationGrid, params: &FlowModelParams) -> Result<Arc<FlowModel>> {
        let key = (dem.id(), params.fill.epsilon.to_bits());

        if let Some(model) = self.lock().get(&key) {
            debug!(dem = %dem.id(), "flow model cache hit");
            return Ok(Arc::clone(model));
        }

        debug!(dem = %dem.id(), "flow model cache miss");
        let built = Arc::new(FlowModel::build(dem, params)?);

        let mut cache = self.lock();
        if let Some(model) = cache.get(&key) {
            return Ok(Arc::clone(model));
        }
        cache.put(key, Arc::clone(&built));
        Ok(built)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<CacheKey, Arc<FlowModel>>> {
        // A panic while holding the lock cannot leave a half-written entry
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for FlowModelCache {
    fn default() -> Self {
        Self::new(8)
    }
}

impl std::fmt::Debug for FlowModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowModelCache").field("len", &self.len()).finish()
    }
}

//! Request-level delineation pipeline.
//!
//! A [`DemHandle`] pairs an elevation grid with its flow model behind `Arc`s
//! and is cheap to clone across threads. [`delineate`] runs one request
//! against it: snap the outlet, trace the watershed, extract streams and
//! compute morphometry. Each stage consumes the previous stage's immutable
//! output; the optional timeout is checked between stages.

use crate::hydrology::{
    extract_streams, longest_flow_path, resolve_outlet, trace_watershed, FlowModel, FlowModelCache, FlowModelParams,
    FlowPath, OutletPoint, SnapParams, StreamNetwork, StreamParams, WatershedMask,
};
use crate::maybe_rayon::map_items;
use crate::morphometry::{compute_morphometry_with_path, MorphometricReport, MorphometryParams};
use cuenca_core::vector::{Feature, FeatureCollection};
use cuenca_core::{Coordinate, ElevationGrid, Error, Result};
use geo_types::{LineString, MultiLineString, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Read-only DEM and flow model shared by concurrent requests
#[derive(Debug, Clone)]
pub struct DemHandle {
    dem: Arc<ElevationGrid>,
    flow: Arc<FlowModel>,
}

impl DemHandle {
    /// Build the flow model for `dem` and wrap both
    pub fn new(dem: ElevationGrid, params: &FlowModelParams) -> Result<Self> {
        let flow = FlowModel::build(&dem, params)?;
        Ok(Self {
            dem: Arc::new(dem),
            flow: Arc::new(flow),
        })
    }

    /// Wrap `dem` with a model taken from (or added to) `cache`
    pub fn with_cache(dem: Arc<ElevationGrid>, cache: &FlowModelCache, params: &FlowModelParams) -> Result<Self> {
        let flow = cache.get_or_build(&dem, params)?;
        Ok(Self { dem, flow })
    }

    /// Pair an existing grid and model; they must come from the same DEM
    pub fn from_parts(dem: Arc<ElevationGrid>, flow: Arc<FlowModel>) -> Result<Self> {
        if dem.id() != flow.dem_id() {
            return Err(Error::InvalidParameter {
                name: "flow",
                value: flow.dem_id().to_string(),
                reason: format!("flow model was built for another DEM than {}", dem.id()),
            });
        }
        Ok(Self { dem, flow })
    }

    pub fn dem(&self) -> &ElevationGrid {
        &self.dem
    }

    pub fn flow(&self) -> &FlowModel {
        &self.flow
    }
}

/// Everything a delineation request can tune
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DelineationParams {
    /// Used when a handle is built from these parameters
    pub flow: FlowModelParams,
    pub snap: SnapParams,
    pub streams: StreamParams,
    pub morphometry: MorphometryParams,
    /// Request budget in milliseconds, checked between stages
    pub timeout_ms: Option<u64>,
}

impl DelineationParams {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Artifacts of one delineation request
#[derive(Debug, Clone)]
pub struct Delineation {
    pub outlet: OutletPoint,
    pub mask: WatershedMask,
    pub boundary: Polygon<f64>,
    pub streams: StreamNetwork,
    pub stream_lines: MultiLineString<f64>,
    pub main_path: FlowPath,
    pub report: MorphometricReport,
}

impl Delineation {
    /// Bundle the geometries with attributes for external writers.
    ///
    /// Layers: `watershed` (one polygon carrying every scalar of the report),
    /// `streams` (one line per segment), `pour_point` (as requested) and
    /// `snap_point` (where the outlet was snapped).
    pub fn to_features(&self) -> FeatureCollection {
        let mut fc = FeatureCollection::new();

        let mut watershed = Feature::new("watershed", self.boundary.clone());
        for (name, value) in self.report.named_values() {
            watershed.set_property(name, value);
        }
        fc.push(watershed);

        for (seg, line) in self.streams.segments.iter().zip(&self.stream_lines.0) {
            let mut feature = Feature::new("streams", LineString::clone(line))
                .with_property("id", seg.id)
                .with_property("order", seg.order)
                .with_property("length_m", seg.length_m);
            if let Some(down) = seg.downstream {
                feature.set_property("downstream", down);
            }
            fc.push(feature);
        }

        let (rx, ry) = self.outlet.requested_xy;
        fc.push(
            Feature::new("pour_point", Point::new(rx, ry))
                .with_property("input", self.outlet.requested.to_string())
                .with_property("row", self.outlet.requested_cell.0)
                .with_property("col", self.outlet.requested_cell.1),
        );
        fc.push(
            Feature::new("snap_point", Point::new(self.outlet.x, self.outlet.y))
                .with_property("row", self.outlet.cell.0)
                .with_property("col", self.outlet.cell.1)
                .with_property("accumulation", self.outlet.accumulation)
                .with_property("snap_distance_m", self.outlet.snap_distance_m),
        );

        fc
    }
}

/// Elapsed-time budget checked at stage boundaries
struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    fn new(limit: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn check(&self, stage: &'static str) -> Result<()> {
        match self.limit {
            Some(limit) if self.start.elapsed() >= limit => Err(Error::Timeout {
                stage,
                elapsed_ms: self.start.elapsed().as_millis(),
            }),
            _ => Ok(()),
        }
    }
}

/// Delineate the watershed draining to `coordinate`.
///
/// # Errors
/// - `OutletOutOfBounds`, `NoChannelNearby` from outlet snapping
/// - `EmptyWatershed` if the snapped outlet holds no data
/// - `Timeout` when the budget runs out between stages
pub fn delineate(handle: &DemHandle, coordinate: &Coordinate, params: &DelineationParams) -> Result<Delineation> {
    let dem = handle.dem();
    let flow = handle.flow();
    let deadline = Deadline::new(params.timeout());

    info!(%coordinate, dem = %dem.id(), "delineation started");

    deadline.check("outlet")?;
    let threshold_cells = params.streams.threshold.to_cells(dem.cell_area());
    let snap = SnapParams {
        min_accumulation: params.snap.min_accumulation.or(Some(threshold_cells)),
        ..params.snap
    };
    let outlet = resolve_outlet(dem, flow, coordinate, &snap)?;
    if outlet.snap_distance_cells > snap.radius as f64 / 2.0 {
        warn!(
            distance_m = outlet.snap_distance_m,
            from = ?outlet.requested_cell,
            to = ?outlet.cell,
            "outlet snapped far from the requested point"
        );
    }
    debug!(cell = ?outlet.cell, accumulation = outlet.accumulation, elapsed_ms = deadline.elapsed_ms(), "outlet resolved");

    deadline.check("watershed")?;
    let mask = trace_watershed(flow, outlet.cell)?;
    let boundary = mask.boundary_polygon(dem);
    debug!(cells = mask.len(), elapsed_ms = deadline.elapsed_ms(), "watershed traced");

    deadline.check("streams")?;
    let streams = extract_streams(flow, &mask, &params.streams)?;
    let stream_lines = streams.to_multi_line_string(dem);
    debug!(segments = streams.len(), max_order = streams.max_order(), elapsed_ms = deadline.elapsed_ms(), "streams extracted");

    deadline.check("flow_path")?;
    let main_path = longest_flow_path(dem, flow, &mask)?;
    debug!(length_m = main_path.length_m, elapsed_ms = deadline.elapsed_ms(), "main flow path traced");

    deadline.check("morphometry")?;
    let report = compute_morphometry_with_path(dem, &mask, &streams, &main_path, &params.morphometry)?;

    info!(
        area_km2 = report.shape.area_km2,
        segments = streams.len(),
        elapsed_ms = deadline.elapsed_ms(),
        "delineation finished"
    );

    Ok(Delineation {
        outlet,
        mask,
        boundary,
        streams,
        stream_lines,
        main_path,
        report,
    })
}

/// Delineate several outlets on one handle, in parallel when enabled.
///
/// Results keep the order of `coordinates`; one failing request does not
/// affect the others.
pub fn delineate_batch(
    handle: &DemHandle,
    coordinates: &[Coordinate],
    params: &DelineationParams,
) -> Vec<Result<Delineation>> {
    map_items(coordinates, |c| delineate(handle, c, params))
}

//! # Cuenca Algorithms
//!
//! Watershed delineation and basin morphometry on gridded DEMs.
//!
//! ## Algorithm Categories
//!
//! - **hydrology**: Depression filling, D8 flow, accumulation, outlet snapping,
//!   watershed tracing, stream networks
//! - **terrain**: Horn slope used by the relief metrics
//! - **morphometry**: Shape, relief, drainage, concentration times, hypsometry
//! - **delineation**: The per-request pipeline tying the above together

mod maybe_rayon;

pub mod delineation;
pub mod hydrology;
pub mod morphometry;
pub mod terrain;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::delineation::{delineate, delineate_batch, DemHandle, Delineation, DelineationParams};
    pub use crate::hydrology::{
        extract_streams, flow_accumulation, flow_direction, priority_flood, resolve_outlet, trace_watershed,
        ChannelThreshold, FlowModel, FlowModelCache, FlowModelParams, PriorityFloodParams, SnapParams, StreamNetwork,
        StreamParams, WatershedMask,
    };
    pub use crate::morphometry::{compute_morphometry, MorphometricReport, MorphometryParams};
    pub use crate::terrain::{slope_scaled, SlopeUnits};
    pub use cuenca_core::prelude::*;
}

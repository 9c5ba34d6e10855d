//! Hydrological analysis algorithms
//!
//! Everything needed to go from a DEM to a delineated watershed:
//! - Priority-Flood: depression filling with an epsilon gradient (Barnes 2014)
//! - Flow direction: D8 single flow direction
//! - Flow accumulation: upstream cell counts in one ordered pass
//! - Flow model: the three above bundled, with a shared LRU cache
//! - Outlet: snapping a pour point to the strongest nearby channel
//! - Watershed: upstream mask of an outlet and its boundary polygon
//! - Stream network: channel links with Strahler order
//! - Flow path: longest flow path to the outlet

mod boundary;
pub(crate) mod flow_accumulation;
pub(crate) mod flow_direction;
mod flow_model;
mod flow_path;
mod outlet;
mod priority_flood;
mod stream_network;
mod watershed;

pub use boundary::mask_polygon;
pub use flow_accumulation::flow_accumulation;
pub use flow_direction::{flow_direction, flow_direction_scaled};
pub use flow_model::{FlowModel, FlowModelCache, FlowModelParams};
pub use flow_path::{longest_flow_path, FlowPath};
pub use outlet::{resolve_outlet, OutletPoint, SnapParams};
pub use priority_flood::{priority_flood, PriorityFloodParams};
pub use stream_network::{extract_streams, ChannelThreshold, StreamNetwork, StreamParams, StreamSegment};
pub use watershed::{trace_watershed, WatershedMask};

//! Terrain analysis algorithms
//!
//! - Slope: rate of change of elevation (Horn 1981)

mod slope;

pub use slope::{slope_scaled, SlopeUnits};

//! # Cuenca Core
//!
//! Core types and I/O for DEM-based watershed delineation.
//!
//! This crate provides:
//! - `Raster<T>`: Generic raster grid type
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System handling, with WGS84 ↔ UTM conversion
//! - `ElevationGrid`: validated, immutable DEM shared by delineation requests
//! - Native GeoTIFF I/O
//! - Feature types for exporting delineation artifacts

pub mod crs;
pub mod dem;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use dem::{Coordinate, DemId, ElevationGrid};
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::dem::{Coordinate, DemId, ElevationGrid};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{d8, GeoTransform, Raster, RasterElement};
}

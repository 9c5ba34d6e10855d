//! Error types for Cuenca

use thiserror::Error;

/// Main error type for delineation and raster operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// The requested outlet lies outside the DEM extent.
    #[error("Outlet ({x:.6}, {y:.6}) is off the map: it falls outside the elevation grid")]
    OutletOutOfBounds { x: f64, y: f64 },

    /// No cell in the snapping window reaches the channel threshold.
    #[error(
        "No channel within {radius} cells of ({row}, {col}): best accumulation {best} < {required}; \
         pick a point closer to a visible channel"
    )]
    NoChannelNearby {
        row: usize,
        col: usize,
        radius: usize,
        best: f64,
        required: f64,
    },

    /// Flow directions do not form a tree draining downhill.
    #[error("Cyclic flow detected at ({row}, {col}): flow directions do not descend")]
    CyclicFlow { row: usize, col: usize },

    #[error("Empty watershed: outlet ({row}, {col}) is not a valid cell")]
    EmptyWatershed { row: usize, col: usize },

    #[error("Request timed out after {elapsed_ms} ms (before stage '{stage}')")]
    Timeout { stage: &'static str, elapsed_ms: u128 },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the caller can retry with different input (another outlet point).
    ///
    /// Every other error is a deterministic function of the DEM and fails
    /// identically on retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::OutletOutOfBounds { .. } | Error::NoChannelNearby { .. }
        )
    }
}

/// Result type alias for Cuenca operations
pub type Result<T> = std::result::Result<T, Error>;

//! Validated elevation grid shared by every delineation request.

use crate::crs::{utm, CRS};
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Approximate length of one degree of latitude, in meters
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// A point supplied by the user.
///
/// `Geographic` is WGS84 longitude/latitude in degrees and is projected into
/// the grid's reference when needed. `Projected` is taken to already be in
/// the grid's reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Coordinate {
    Geographic { lat: f64, lon: f64 },
    Projected { x: f64, y: f64 },
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coordinate::Geographic { lat, lon } => write!(f, "lat {:.6}, lon {:.6}", lat, lon),
            Coordinate::Projected { x, y } => write!(f, "x {:.3}, y {:.3}", x, y),
        }
    }
}

/// Content fingerprint of an elevation grid, used as a cache key.
///
/// Two grids with identical shape, georeferencing and elevation bits share
/// an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DemId(u64);

impl fmt::Display for DemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Immutable DEM with metric cell dimensions.
///
/// No-data sentinels and non-finite values are normalized to NaN on
/// construction, so `elevation` returning `None` is the single no-data test
/// downstream code needs.
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    raster: Raster<f64>,
    geographic: bool,
    cell_width: f64,
    cell_height: f64,
    valid_cells: usize,
    id: DemId,
}

impl ElevationGrid {
    /// Validate a raster and take ownership of it.
    ///
    /// A grid without CRS is treated as EPSG:4326 when its pixels are at
    /// most 0.01 units wide and tall and its extent fits in longitude and
    /// latitude ranges, otherwise as a metric projected grid.
    pub fn from_raster(mut raster: Raster<f64>) -> Result<Self> {
        let (rows, cols) = raster.shape();
        if rows < 2 || cols < 2 {
            return Err(Error::InvalidRaster(format!(
                "grid must be at least 2x2 cells, got {}x{}",
                rows, cols
            )));
        }

        let gt = *raster.transform();
        if gt.row_rotation.abs() > 1e-12 || gt.col_rotation.abs() > 1e-12 {
            return Err(Error::InvalidRaster(
                "rotated geotransforms are not supported".into(),
            ));
        }
        let (pw, ph) = gt.cell_dimensions();
        if !(pw.is_finite() && ph.is_finite() && pw > 0.0 && ph > 0.0) {
            return Err(Error::InvalidRaster(format!(
                "cell size must be positive and finite, got {} x {}",
                gt.pixel_width, gt.pixel_height
            )));
        }

        let nodata = raster.nodata();
        let mut valid_cells = 0usize;
        for z in raster.data_mut().iter_mut() {
            let is_nd = !z.is_finite()
                || nodata.is_some_and(|nd| (*z - nd).abs() <= f64::EPSILON * nd.abs().max(1.0));
            if is_nd {
                *z = f64::NAN;
            } else {
                valid_cells += 1;
            }
        }
        raster.set_nodata(Some(f64::NAN));

        if valid_cells == 0 {
            return Err(Error::InvalidRaster("grid holds no valid elevations".into()));
        }

        let geographic = match raster.crs() {
            Some(crs) => crs.is_geographic(),
            None => looks_geographic(&gt, rows, cols),
        };

        let (cell_width, cell_height) = if geographic {
            let (_, min_y, _, max_y) = raster.bounds();
            let center_lat = ((min_y + max_y) / 2.0).to_radians();
            (
                pw * METERS_PER_DEGREE * center_lat.cos(),
                ph * METERS_PER_DEGREE,
            )
        } else {
            (pw, ph)
        };

        let id = fingerprint(&raster);

        Ok(Self {
            raster,
            geographic,
            cell_width,
            cell_height,
            valid_cells,
            id,
        })
    }

    /// Build a grid from nested rows of elevations.
    ///
    /// Fails with `InvalidRaster` when rows differ in length.
    pub fn from_rows(rows: Vec<Vec<f64>>, transform: GeoTransform, crs: Option<CRS>) -> Result<Self> {
        let ncols = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
            return Err(Error::InvalidRaster(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                ncols
            )));
        }

        let nrows = rows.len();
        let data: Vec<f64> = rows.into_iter().flatten().collect();
        let mut raster = Raster::from_vec(data, nrows, ncols)?;
        raster.set_transform(transform);
        raster.set_crs(crs);
        Self::from_raster(raster)
    }

    pub fn raster(&self) -> &Raster<f64> {
        &self.raster
    }

    pub fn rows(&self) -> usize {
        self.raster.rows()
    }

    pub fn cols(&self) -> usize {
        self.raster.cols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.raster.shape()
    }

    /// Elevation at (row, col); `None` outside the grid or on no-data
    pub fn elevation(&self, row: usize, col: usize) -> Option<f64> {
        self.raster
            .data()
            .get((row, col))
            .copied()
            .filter(|z| !z.is_nan())
    }

    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.elevation(row, col).is_some()
    }

    /// Number of cells holding data
    pub fn valid_cells(&self) -> usize {
        self.valid_cells
    }

    pub fn transform(&self) -> &GeoTransform {
        self.raster.transform()
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.raster.crs()
    }

    /// Whether map coordinates are degrees
    pub fn is_geographic(&self) -> bool {
        self.geographic
    }

    pub fn id(&self) -> DemId {
        self.id
    }

    /// East-west cell extent in meters
    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    /// North-south cell extent in meters
    pub fn cell_height(&self) -> f64 {
        self.cell_height
    }

    /// Cell area in square meters
    pub fn cell_area(&self) -> f64 {
        self.cell_width * self.cell_height
    }

    /// Side of a square cell with the same area, in meters
    pub fn cell_size(&self) -> f64 {
        self.cell_area().sqrt()
    }

    /// Map coordinates of a cell center
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.raster.pixel_to_geo(col, row)
    }

    /// WGS84 (lon, lat) of a cell center, when the grid reference allows it
    pub fn cell_center_wgs84(&self, row: usize, col: usize) -> Option<(f64, f64)> {
        let (x, y) = self.cell_center(row, col);
        if self.geographic {
            return Some((x, y));
        }
        let (zone, north) = self.crs().and_then(CRS::utm_zone)?;
        Some(utm::utm_to_wgs84(x, y, zone, north))
    }

    /// Express a coordinate in the grid's map reference
    pub fn to_grid_xy(&self, coordinate: &Coordinate) -> Result<(f64, f64)> {
        match *coordinate {
            Coordinate::Projected { x, y } => Ok((x, y)),
            Coordinate::Geographic { lat, lon } => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Err(Error::InvalidParameter {
                        name: "coordinate",
                        value: coordinate.to_string(),
                        reason: "latitude/longitude out of range".into(),
                    });
                }
                if self.geographic {
                    return Ok((lon, lat));
                }
                match self.crs().and_then(CRS::utm_zone) {
                    Some((zone, north)) => Ok(utm::wgs84_to_utm(lon, lat, zone, north)),
                    None => Err(Error::InvalidParameter {
                        name: "coordinate",
                        value: coordinate.to_string(),
                        reason: format!(
                            "cannot project WGS84 into {}",
                            self.crs().map_or("a grid without CRS".to_string(), CRS::identifier)
                        ),
                    }),
                }
            }
        }
    }

    /// Cell containing a coordinate.
    ///
    /// Fails with `OutletOutOfBounds` when the point falls outside the extent.
    pub fn locate(&self, coordinate: &Coordinate) -> Result<(usize, usize)> {
        let (x, y) = self.to_grid_xy(coordinate)?;
        let (col, row) = self.transform().geo_to_pixel(x, y);

        let inside = col.is_finite()
            && row.is_finite()
            && col >= 0.0
            && row >= 0.0
            && col < self.cols() as f64
            && row < self.rows() as f64;
        if !inside {
            return Err(Error::OutletOutOfBounds { x, y });
        }

        Ok((row.floor() as usize, col.floor() as usize))
    }
}

/// Coarsest pixel, in degrees, still read as a lon/lat grid (36", which
/// covers the 30" global products). Sub-meter metric grids stay projected.
const MAX_DEGREE_PIXEL: f64 = 0.01 + 1e-12;

fn looks_geographic(gt: &GeoTransform, rows: usize, cols: usize) -> bool {
    let (pw, ph) = gt.cell_dimensions();
    let (min_x, min_y, max_x, max_y) = gt.bounds(cols, rows);
    pw <= MAX_DEGREE_PIXEL
        && ph <= MAX_DEGREE_PIXEL
        && min_x >= -180.0
        && max_x <= 180.0
        && min_y >= -90.0
        && max_y <= 90.0
}

fn fingerprint(raster: &Raster<f64>) -> DemId {
    let mut hasher = DefaultHasher::new();
    raster.shape().hash(&mut hasher);
    for coeff in raster.transform().to_gdal() {
        coeff.to_bits().hash(&mut hasher);
    }
    raster.crs().map(CRS::identifier).hash(&mut hasher);
    for z in raster.data().iter() {
        // all NaNs collapse to one bit pattern
        let bits = if z.is_nan() { u64::MAX } else { z.to_bits() };
        bits.hash(&mut hasher);
    }
    DemId(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(rows: usize, cols: usize) -> Vec<Vec<f64>> {
        (0..rows)
            .map(|r| (0..cols).map(|c| 100.0 - r as f64 - c as f64).collect())
            .collect()
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let mut rows = ramp(3, 3);
        rows[1].pop();
        let err = ElevationGrid::from_rows(rows, GeoTransform::new(0.0, 30.0, 10.0, -10.0), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRaster(_)), "{err}");
    }

    #[test]
    fn test_rejects_undersized_grid() {
        let err = ElevationGrid::from_rows(ramp(1, 5), GeoTransform::new(0.0, 10.0, 10.0, -10.0), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRaster(_)));
    }

    #[test]
    fn test_rejects_all_nodata() {
        let rows = vec![vec![-9999.0; 3]; 3];
        let mut raster = Raster::from_vec(rows.concat(), 3, 3).unwrap();
        raster.set_nodata(Some(-9999.0));
        assert!(matches!(
            ElevationGrid::from_raster(raster),
            Err(Error::InvalidRaster(_))
        ));
    }

    #[test]
    fn test_nodata_normalized() {
        let mut raster = Raster::from_vec(vec![1.0, 2.0, -9999.0, 4.0], 2, 2).unwrap();
        raster.set_transform(GeoTransform::new(500_000.0, 600_000.0, 30.0, -30.0));
        raster.set_nodata(Some(-9999.0));
        let grid = ElevationGrid::from_raster(raster).unwrap();

        assert_eq!(grid.valid_cells(), 3);
        assert_eq!(grid.elevation(1, 0), None);
        assert_eq!(grid.elevation(1, 1), Some(4.0));
        assert_eq!(grid.elevation(2, 0), None);
        assert!(!grid.is_geographic());
        assert_relative_eq!(grid.cell_size(), 30.0);
    }

    #[test]
    fn test_geographic_cell_size_at_equator() {
        let gt = GeoTransform::new(-75.0, 0.05, 1.0 / 1200.0, -1.0 / 1200.0);
        let grid = ElevationGrid::from_rows(ramp(120, 120), gt, Some(CRS::wgs84())).unwrap();
        assert!(grid.is_geographic());
        assert_relative_eq!(grid.cell_height(), METERS_PER_DEGREE / 1200.0, epsilon = 1e-9);
        assert_relative_eq!(grid.cell_width(), METERS_PER_DEGREE / 1200.0, max_relative = 1e-3);
    }

    #[test]
    fn test_missing_crs_assumed_wgs84_for_degree_grids() {
        let gt = GeoTransform::new(-74.2, 4.7, 1.0 / 1200.0, -1.0 / 1200.0);
        let grid = ElevationGrid::from_rows(ramp(10, 10), gt, None).unwrap();
        assert!(grid.is_geographic());

        let metric = ElevationGrid::from_rows(ramp(10, 10), GeoTransform::new(0.0, 100.0, 10.0, -10.0), None)
            .unwrap();
        assert!(!metric.is_geographic());
    }

    #[test]
    fn test_submeter_local_grid_stays_projected() {
        // 0.5 m survey grid anchored at a local (0, 0) origin
        let gt = GeoTransform::new(0.0, 5.0, 0.5, -0.5);
        let grid = ElevationGrid::from_rows(ramp(10, 10), gt, None).unwrap();
        assert!(!grid.is_geographic());
        assert_relative_eq!(grid.cell_area(), 0.25);

        let coarse = GeoTransform::new(-74.2, 4.7, 0.1, -0.1);
        assert!(!ElevationGrid::from_rows(ramp(10, 10), coarse, None).unwrap().is_geographic());

        let arc_30 = GeoTransform::new(-74.2, 4.7, 1.0 / 120.0, -1.0 / 120.0);
        assert!(ElevationGrid::from_rows(ramp(10, 10), arc_30, None).unwrap().is_geographic());
    }

    #[test]
    fn test_locate_geographic() {
        let gt = GeoTransform::new(-74.2, 4.7, 0.01, -0.01);
        let grid = ElevationGrid::from_rows(ramp(10, 10), gt, Some(CRS::wgs84())).unwrap();

        let cell = grid.locate(&Coordinate::Geographic { lat: 4.655, lon: -74.175 }).unwrap();
        assert_eq!(cell, (4, 2));

        let err = grid
            .locate(&Coordinate::Geographic { lat: 6.2, lon: -75.5 })
            .unwrap_err();
        assert!(matches!(err, Error::OutletOutOfBounds { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_locate_utm() {
        let (lon, lat) = (-74.0817, 4.6097);
        let (e, n) = utm::wgs84_to_utm(lon, lat, 18, true);
        let gt = GeoTransform::new(e - 55.0, n + 55.0, 10.0, -10.0);
        let grid = ElevationGrid::from_rows(ramp(10, 10), gt, Some(CRS::utm(18, true))).unwrap();

        let cell = grid.locate(&Coordinate::Geographic { lat, lon }).unwrap();
        assert_eq!(cell, (5, 5));

        let (lon2, lat2) = grid.cell_center_wgs84(5, 5).unwrap();
        assert!((lon2 - lon).abs() < 1e-3 && (lat2 - lat).abs() < 1e-3);
    }

    #[test]
    fn test_projected_grid_without_crs_rejects_lat_lon() {
        let grid =
            ElevationGrid::from_rows(ramp(5, 5), GeoTransform::new(0.0, 50.0, 10.0, -10.0), None).unwrap();
        let err = grid
            .locate(&Coordinate::Geographic { lat: 4.6, lon: -74.1 })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert_eq!(grid.locate(&Coordinate::Projected { x: 15.0, y: 35.0 }).unwrap(), (1, 1));
    }

    #[test]
    fn test_dem_id_tracks_content() {
        let gt = GeoTransform::new(0.0, 50.0, 10.0, -10.0);
        let a = ElevationGrid::from_rows(ramp(5, 5), gt, None).unwrap();
        let b = ElevationGrid::from_rows(ramp(5, 5), gt, None).unwrap();
        let mut rows = ramp(5, 5);
        rows[2][2] += 0.5;
        let c = ElevationGrid::from_rows(rows, gt, None).unwrap();

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }
}

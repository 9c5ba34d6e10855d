//! Flow accumulation algorithm
//!
//! Counts, for every cell, the cells that drain through it (itself
//! included) along D8 flow directions. Multiply by the cell area for the
//! upstream contributing area.

use cuenca_core::raster::{d8, Raster};
use cuenca_core::{Error, Result};
use ndarray::Array2;

/// Calculate flow accumulation from a filled DEM and its D8 directions.
///
/// # Algorithm
/// Valid cells are visited once, highest filled elevation first (equal
/// elevations in row-major order). Every cell starts at 1 and hands its
/// total to its downstream cell. On a surface where each direction points
/// strictly downhill the receiver is always visited later; a receiver that
/// was already visited means the directions contain a cycle or an uphill
/// step, reported as [`Error::CyclicFlow`] at the sending cell.
///
/// Cells draining off the grid or into no-data keep their own total.
/// No-data cells are NaN.
pub fn flow_accumulation(filled: &Raster<f64>, flow_dir: &Raster<u8>) -> Result<Raster<f64>> {
    if filled.shape() != flow_dir.shape() {
        let (er, ec) = filled.shape();
        let (ar, ac) = flow_dir.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }

    let (rows, cols) = filled.shape();
    let elevations = filled.data();
    let directions = flow_dir.data();

    let mut order: Vec<(f64, usize)> = Vec::with_capacity(rows * cols);
    let mut accumulation = Array2::<f64>::from_elem((rows, cols), f64::NAN);
    for row in 0..rows {
        for col in 0..cols {
            if filled.is_valid_at(row, col) {
                order.push((elevations[(row, col)], row * cols + col));
                accumulation[(row, col)] = 1.0;
            }
        }
    }
    order.sort_unstable_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut processed = Array2::<bool>::from_elem((rows, cols), false);

    for &(_, idx) in &order {
        let (row, col) = (idx / cols, idx % cols);
        processed[(row, col)] = true;

        let dir = directions[(row, col)];
        let Some((nr, nc)) = d8::target(row, col, dir, rows, cols) else {
            continue;
        };
        if !filled.is_valid_at(nr, nc) {
            continue;
        }
        if processed[(nr, nc)] {
            return Err(Error::CyclicFlow { row, col });
        }

        accumulation[(nr, nc)] += accumulation[(row, col)];
    }

    filled.with_data(accumulation, Some(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_direction::flow_direction;
    use cuenca_core::GeoTransform;

    fn accumulate(dem: &Raster<f64>) -> Raster<f64> {
        let fdir = flow_direction(dem).unwrap();
        flow_accumulation(dem, &fdir).unwrap()
    }

    #[test]
    fn test_flow_accumulation_linear() {
        // 1x5 strip sloping east: 0 -> 1 -> 2 -> 3 -> 4
        let mut dem = Raster::new(1, 5);
        dem.set_transform(GeoTransform::new(0.0, 1.0, 1.0, -1.0));
        for col in 0..5 {
            dem.set(0, col, (5 - col) as f64).unwrap();
        }

        let acc = accumulate(&dem);

        assert_eq!(acc.get(0, 0).unwrap(), 1.0); // Headwater
        assert_eq!(acc.get(0, 1).unwrap(), 2.0);
        assert_eq!(acc.get(0, 2).unwrap(), 3.0);
        assert_eq!(acc.get(0, 4).unwrap(), 5.0); // Outlet
    }

    #[test]
    fn test_flow_accumulation_convergent() {
        //  5 5 5
        //  5 1 5
        //  5 5 5
        let mut dem = Raster::filled(3, 3, 5.0);
        dem.set_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        dem.set(1, 1, 1.0).unwrap();

        let acc = accumulate(&dem);
        assert_eq!(acc.get(1, 1).unwrap(), 9.0);
        assert_eq!(acc.get(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_flow_accumulation_plane() {
        // 5x5 plane sloping south
        let mut dem = Raster::new(5, 5);
        dem.set_transform(GeoTransform::new(0.0, 5.0, 1.0, -1.0));
        for row in 0..5 {
            for col in 0..5 {
                dem.set(row, col, (5 - row) as f64 * 10.0).unwrap();
            }
        }

        let acc = accumulate(&dem);
        for col in 0..5 {
            assert_eq!(acc.get(0, col).unwrap(), 1.0, "top row holds only itself");
            assert_eq!(acc.get(4, col).unwrap(), 5.0);
        }
    }

    #[test]
    fn test_at_least_one_and_at_least_each_inflow() {
        let mut dem = Raster::new(8, 8);
        dem.set_transform(GeoTransform::new(0.0, 8.0, 1.0, -1.0));
        for row in 0..8 {
            for col in 0..8 {
                let z = ((row as f64 - 3.5).powi(2) + (col as f64 * 0.7).sin() * 3.0) + col as f64;
                dem.set(row, col, z).unwrap();
            }
        }
        let fdir = flow_direction(&dem).unwrap();
        let acc = flow_accumulation(&dem, &fdir).unwrap();

        for row in 0..8 {
            for col in 0..8 {
                let a = acc.get(row, col).unwrap();
                assert!(a >= 1.0);
                let dir = fdir.get(row, col).unwrap();
                if let Some((nr, nc)) = d8::target(row, col, dir, 8, 8) {
                    assert!(acc.get(nr, nc).unwrap() > a);
                }
            }
        }
    }

    #[test]
    fn test_nodata_is_nan() {
        let mut dem = Raster::filled(3, 3, 5.0);
        dem.set(1, 1, f64::NAN).unwrap();
        let acc = accumulate(&dem);
        assert!(acc.get(1, 1).unwrap().is_nan());
        assert_eq!(acc.get(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_cycle_is_reported() {
        // (0,0) E -> (0,1) W -> (0,0) on a flat surface
        let dem = Raster::filled(2, 2, 1.0);
        let mut fdir: Raster<u8> = Raster::new(2, 2);
        fdir.set(0, 0, 1).unwrap();
        fdir.set(0, 1, 5).unwrap();

        let err = flow_accumulation(&dem, &fdir).unwrap_err();
        assert!(matches!(err, Error::CyclicFlow { .. }));
    }

    #[test]
    fn test_shape_mismatch() {
        let dem = Raster::filled(2, 2, 1.0);
        let fdir: Raster<u8> = Raster::new(3, 2);
        assert!(matches!(
            flow_accumulation(&dem, &fdir),
            Err(Error::SizeMismatch { .. })
        ));
    }
}

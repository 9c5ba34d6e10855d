//! Morphometric analysis of a delineated watershed
//!
//! - Shape: area, perimeter, compactness, form factor, sinuosity
//! - Relief: elevation statistics, main-path and terrain slope
//! - Drainage: stream length, density, frequency, Strahler orders
//! - Concentration: time of concentration under nine empirical methods
//! - Hypsometry: curve, integral and class table

mod concentration;
mod drainage;
mod hypsometry;
mod relief;
mod shape;

pub use concentration::{
    concentration_times, ConcentrationEstimate, ConcentrationInputs, ConcentrationMethod, ConcentrationSummary,
    ConcentrationTimes,
};
pub use drainage::{drainage_metrics, DensityClass, DrainageMetrics};
pub use hypsometry::{
    hypsometric_curve, hypsometric_table, HypsometricClass, HypsometricCurve, HypsometricTable, HypsometryScheme,
};
pub use relief::{relief_metrics, ReliefMetrics};
pub use shape::{shape_metrics, AreaClass, FormClass, ShapeMetrics, SinuosityClass};

use crate::hydrology::{longest_flow_path, FlowModel, FlowPath, StreamNetwork, WatershedMask};
use cuenca_core::vector::AttributeValue;
use cuenca_core::{ElevationGrid, Result};
use serde::{Deserialize, Serialize};

/// Parameters for morphometric analysis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphometryParams {
    /// Number of equal elevation steps on the hypsometric curve
    pub hypsometry_bands: usize,
    pub hypsometry_scheme: HypsometryScheme,
}

impl Default for MorphometryParams {
    fn default() -> Self {
        Self {
            hypsometry_bands: 10,
            hypsometry_scheme: HypsometryScheme::default(),
        }
    }
}

/// Every morphometric parameter of one watershed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphometricReport {
    pub cell_count: usize,
    pub shape: ShapeMetrics,
    pub relief: ReliefMetrics,
    pub drainage: DrainageMetrics,
    pub concentration: ConcentrationTimes,
    pub hypsometric_curve: HypsometricCurve,
    pub hypsometric_table: HypsometricTable,
}

/// Compute the full report, tracing the longest flow path first.
pub fn compute_morphometry(
    dem: &ElevationGrid,
    flow: &FlowModel,
    mask: &WatershedMask,
    network: &StreamNetwork,
    params: &MorphometryParams,
) -> Result<MorphometricReport> {
    let path = longest_flow_path(dem, flow, mask)?;
    compute_morphometry_with_path(dem, mask, network, &path, params)
}

/// Compute the full report for an already traced main flow path.
pub fn compute_morphometry_with_path(
    dem: &ElevationGrid,
    mask: &WatershedMask,
    network: &StreamNetwork,
    path: &FlowPath,
    params: &MorphometryParams,
) -> Result<MorphometricReport> {
    let area_m2 = mask.len() as f64 * dem.cell_area();
    let perimeter_m = mask.perimeter(dem.cell_width(), dem.cell_height());

    let shape = shape_metrics(area_m2, perimeter_m, path);
    let relief = relief_metrics(dem, mask, path)?;
    let drainage = drainage_metrics(network, shape.area_km2);

    let concentration = concentration_times(ConcentrationInputs {
        area_km2: shape.area_km2,
        length_km: shape.main_length_km,
        relief_m: relief.relief_m,
        slope: relief.path_slope.unwrap_or(0.0),
    });

    let elevations: Vec<f64> = mask.cells().filter_map(|(r, c)| dem.elevation(r, c)).collect();
    let hypsometric_curve = hypsometric_curve(&elevations, params.hypsometry_bands)?;
    let hypsometric_table = hypsometric_table(&elevations, dem.cell_area(), params.hypsometry_scheme)?;

    Ok(MorphometricReport {
        cell_count: mask.len(),
        shape,
        relief,
        drainage,
        concentration,
        hypsometric_curve,
        hypsometric_table,
    })
}

impl MorphometricReport {
    /// Scalar parameters as ordered (name, value) rows for exporters
    pub fn named_values(&self) -> Vec<(&'static str, AttributeValue)> {
        let s = &self.shape;
        let r = &self.relief;
        let d = &self.drainage;
        let h = &self.hypsometric_curve;

        let mut rows: Vec<(&'static str, AttributeValue)> = vec![
            ("cell_count", self.cell_count.into()),
            ("area_km2", s.area_km2.into()),
            ("area_ha", s.area_ha.into()),
            ("area_class", s.area_class.label().into()),
            ("perimeter_km", s.perimeter_km.into()),
            ("compactness", s.compactness.into()),
            ("main_length_km", s.main_length_km.into()),
            ("form_factor", s.form_factor.into()),
            ("form_class", s.form_class.map_or(AttributeValue::Null, |c| c.label().into())),
            ("sinuosity", s.sinuosity.into()),
            ("sinuosity_class", s.sinuosity_class.map_or(AttributeValue::Null, |c| c.label().into())),
            ("elevation_min_m", r.elevation_min.into()),
            ("elevation_max_m", r.elevation_max.into()),
            ("elevation_mean_m", r.elevation_mean.into()),
            ("relief_m", r.relief_m.into()),
            ("path_slope_percent", r.path_slope_percent.into()),
            ("path_slope_degrees", r.path_slope_degrees.into()),
            ("mean_slope_percent", r.mean_slope_percent.into()),
            ("mean_slope_degrees", r.mean_slope_degrees.into()),
            ("stream_segments", d.segment_count.into()),
            ("stream_length_km", d.total_length_km.into()),
            ("drainage_density", d.drainage_density.into()),
            ("density_class", d.density_class.map_or(AttributeValue::Null, |c| c.label().into())),
            ("stream_frequency", d.stream_frequency.into()),
            ("max_strahler_order", d.max_order.into()),
            ("hypsometric_integral", h.integral.into()),
            ("elevation_relief_ratio", h.elevation_relief_ratio.into()),
        ];

        for e in &self.concentration.estimates {
            rows.push((tc_key(e.method), e.hours.into()));
        }
        if let Some(summary) = &self.concentration.summary {
            rows.push(("tc_mean_h", summary.mean_hours.into()));
            rows.push(("tc_median_h", summary.median_hours.into()));
        }
        rows
    }
}

fn tc_key(method: ConcentrationMethod) -> &'static str {
    match method {
        ConcentrationMethod::Giandotti => "tc_giandotti_h",
        ConcentrationMethod::BransbyWilliams => "tc_bransby_williams_h",
        ConcentrationMethod::California => "tc_california_h",
        ConcentrationMethod::Clark => "tc_clark_h",
        ConcentrationMethod::Passini => "tc_passini_h",
        ConcentrationMethod::PilgrimMcDermott => "tc_pilgrim_mcdermott_h",
        ConcentrationMethod::ValenciaZuluaga => "tc_valencia_zuluaga_h",
        ConcentrationMethod::Kirpich => "tc_kirpich_h",
        ConcentrationMethod::Temez => "tc_temez_h",
    }
}

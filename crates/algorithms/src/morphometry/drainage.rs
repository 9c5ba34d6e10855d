//! Drainage network metrics.

use crate::hydrology::StreamNetwork;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Drainage density class (km/km²)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DensityClass {
    #[serde(rename = "Baja")]
    Low,
    #[serde(rename = "Moderada")]
    Moderate,
    #[serde(rename = "Alta")]
    High,
    #[serde(rename = "Muy Alta")]
    VeryHigh,
}

impl DensityClass {
    pub fn from_density(d: f64) -> Self {
        if d < 1.0 {
            DensityClass::Low
        } else if d < 2.0 {
            DensityClass::Moderate
        } else if d < 3.0 {
            DensityClass::High
        } else {
            DensityClass::VeryHigh
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DensityClass::Low => "Baja",
            DensityClass::Moderate => "Moderada",
            DensityClass::High => "Alta",
            DensityClass::VeryHigh => "Muy Alta",
        }
    }
}

impl fmt::Display for DensityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrainageMetrics {
    pub threshold_cells: f64,
    pub segment_count: usize,
    pub channel_cells: usize,
    pub total_length_km: f64,
    /// Stream length per unit area (km/km²)
    pub drainage_density: Option<f64>,
    pub density_class: Option<DensityClass>,
    /// Segments per km²
    pub stream_frequency: Option<f64>,
    pub max_order: u32,
    pub order_counts: BTreeMap<u32, usize>,
}

pub fn drainage_metrics(network: &StreamNetwork, area_km2: f64) -> DrainageMetrics {
    let total_length_km = network.total_length_m() / 1e3;
    let segment_count = network.len();

    let drainage_density = (area_km2 > 0.0).then(|| total_length_km / area_km2);
    let stream_frequency = (area_km2 > 0.0).then(|| segment_count as f64 / area_km2);

    DrainageMetrics {
        threshold_cells: network.threshold_cells,
        segment_count,
        channel_cells: network.channel_cell_count(),
        total_length_km,
        drainage_density,
        density_class: drainage_density.map(DensityClass::from_density),
        stream_frequency,
        max_order: network.max_order(),
        order_counts: network.order_counts(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::StreamSegment;

    fn network() -> StreamNetwork {
        let seg = |id, order, downstream, length_m| StreamSegment {
            id,
            cells: vec![(0, id)],
            order,
            downstream,
            upstream: vec![],
            length_m,
        };
        StreamNetwork {
            threshold_cells: 10.0,
            segments: vec![seg(0, 2, None, 1500.0), seg(1, 1, Some(0), 500.0), seg(2, 1, Some(0), 1000.0)],
        }
    }

    #[test]
    fn test_density_and_frequency() {
        let m = drainage_metrics(&network(), 2.0);
        assert_eq!(m.segment_count, 3);
        assert_eq!(m.total_length_km, 3.0);
        assert_eq!(m.drainage_density, Some(1.5));
        assert_eq!(m.density_class, Some(DensityClass::Moderate));
        assert_eq!(m.stream_frequency, Some(1.5));
        assert_eq!(m.max_order, 2);
        assert_eq!(m.order_counts.get(&1), Some(&2));
    }

    #[test]
    fn test_zero_area() {
        let m = drainage_metrics(&network(), 0.0);
        assert_eq!(m.drainage_density, None);
        assert_eq!(m.density_class, None);
    }
}

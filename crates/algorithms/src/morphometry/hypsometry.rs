//! Hypsometric curve, integral and class table.
//!
//! The curve relates relative area (share of the basin at or above an
//! elevation) to relative elevation `(z - min) / (max - min)`. The table
//! bins elevations into classes and reports area and cumulative area per
//! class.

use cuenca_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Hypsometric curve with its integral
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypsometricCurve {
    /// (relative area, relative elevation), from (1, 0) to (0, 1)
    pub points: Vec<(f64, f64)>,
    /// Area under the curve by the trapezoid rule
    pub integral: f64,
    /// (mean - min) / (max - min); `None` on flat terrain
    pub elevation_relief_ratio: Option<f64>,
}

/// Build the curve from the elevations of every basin cell.
///
/// `bands` equal steps split the elevation range; each threshold contributes
/// the share of cells at or above it. Flat terrain gives the straight line
/// (1, 0)–(0, 1) with integral 0.5.
pub fn hypsometric_curve(elevations: &[f64], bands: usize) -> Result<HypsometricCurve> {
    if bands == 0 {
        return Err(Error::InvalidParameter {
            name: "hypsometry_bands",
            value: bands.to_string(),
            reason: "need at least one band".into(),
        });
    }
    let (min, max, mean) = summarize(elevations)?;
    let range = max - min;

    let points: Vec<(f64, f64)> = if range > 0.0 {
        let mut sorted = elevations.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len() as f64;
        (0..=bands)
            .map(|i| {
                let h = i as f64 / bands as f64;
                let area = if i == 0 {
                    1.0
                } else if i == bands {
                    0.0
                } else {
                    let threshold = min + h * range;
                    let below = sorted.partition_point(|&z| z < threshold);
                    (sorted.len() - below) as f64 / n
                };
                (area, h)
            })
            .collect()
    } else {
        vec![(1.0, 0.0), (0.0, 1.0)]
    };

    let integral = points
        .windows(2)
        .map(|w| (w[0].0 - w[1].0).abs() * (w[0].1 + w[1].1) / 2.0)
        .sum();

    Ok(HypsometricCurve {
        points,
        integral,
        elevation_relief_ratio: (range > 0.0).then(|| (mean - min) / range),
    })
}

/// How elevation classes are drawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", content = "value", rename_all = "snake_case")]
pub enum HypsometryScheme {
    /// Fixed-height classes; the first runs from the floored minimum up to
    /// the next `..99` elevation (for a 100 m step)
    FixedStep(f64),
    /// `n` classes of equal height between min and max
    EqualIntervals(usize),
    /// `n` classes holding equal shares of cells; falls back to equal
    /// intervals when quantiles coincide
    Quantiles(usize),
}

impl Default for HypsometryScheme {
    fn default() -> Self {
        HypsometryScheme::FixedStep(100.0)
    }
}

/// One elevation class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypsometricClass {
    pub number: usize,
    pub lower: f64,
    pub upper: f64,
    pub mid: f64,
    pub cells: usize,
    pub area_m2: f64,
    pub area_km2: f64,
    pub cumulative_below_km2: f64,
    pub cumulative_above_km2: f64,
    pub cumulative_below_percent: f64,
    pub cumulative_above_percent: f64,
    pub percent: f64,
}

/// Classes ordered from the lowest elevation up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypsometricTable {
    pub scheme: HypsometryScheme,
    pub classes: Vec<HypsometricClass>,
}

impl HypsometricTable {
    pub fn total_area_km2(&self) -> f64 {
        self.classes.iter().map(|c| c.area_km2).sum()
    }
}

/// Bin basin elevations into classes and tabulate areas.
///
/// Bins are half-open `[lower, upper)` except the last, which includes its
/// upper edge.
pub fn hypsometric_table(elevations: &[f64], cell_area_m2: f64, scheme: HypsometryScheme) -> Result<HypsometricTable> {
    let (min, max, _) = summarize(elevations)?;

    let edges = match scheme {
        HypsometryScheme::FixedStep(step) => {
            if !(step.is_finite() && step >= 1.0) {
                return Err(Error::InvalidParameter {
                    name: "hypsometry_step",
                    value: step.to_string(),
                    reason: "step must be at least 1 m".into(),
                });
            }
            fixed_step_edges(min, max, step)
        }
        HypsometryScheme::EqualIntervals(n) => equal_edges(min, max, check_classes(n)?),
        HypsometryScheme::Quantiles(n) => {
            let n = check_classes(n)?;
            let mut sorted = elevations.to_vec();
            sorted.sort_by(f64::total_cmp);
            let mut edges: Vec<f64> = (0..=n).map(|i| quantile(&sorted, i as f64 / n as f64)).collect();
            edges.dedup();
            if edges.len() < n + 1 {
                equal_edges(min, max, n)
            } else {
                edges
            }
        }
    };

    let counts = histogram(elevations, &edges);
    let total_cells: usize = counts.iter().sum();
    let total_km2 = total_cells as f64 * cell_area_m2 / 1e6;

    let mut classes = Vec::with_capacity(counts.len());
    let mut below_cells = 0usize;
    for (i, &cells) in counts.iter().enumerate() {
        let (lower, upper) = (edges[i], edges[i + 1]);
        let above_cells = total_cells - below_cells;
        below_cells += cells;

        let area_m2 = cells as f64 * cell_area_m2;
        let cumulative_below_km2 = below_cells as f64 * cell_area_m2 / 1e6;
        let cumulative_above_km2 = above_cells as f64 * cell_area_m2 / 1e6;
        let pct = |v: f64| if total_km2 > 0.0 { v / total_km2 * 100.0 } else { 0.0 };

        classes.push(HypsometricClass {
            number: i + 1,
            lower,
            upper,
            mid: (lower + upper) / 2.0,
            cells,
            area_m2,
            area_km2: area_m2 / 1e6,
            cumulative_below_km2,
            cumulative_above_km2,
            cumulative_below_percent: pct(cumulative_below_km2),
            cumulative_above_percent: pct(cumulative_above_km2),
            percent: pct(area_m2 / 1e6),
        });
    }

    // Pin the cumulative ends against rounding
    if let Some(last) = classes.last_mut() {
        last.cumulative_below_percent = 100.0;
    }
    if let Some(first) = classes.first_mut() {
        first.cumulative_above_percent = 100.0;
    }

    Ok(HypsometricTable { scheme, classes })
}

fn summarize(elevations: &[f64]) -> Result<(f64, f64, f64)> {
    if elevations.is_empty() || elevations.iter().any(|z| !z.is_finite()) {
        return Err(Error::Algorithm(
            "hypsometry needs at least one finite elevation".into(),
        ));
    }
    let min = elevations.iter().copied().fold(f64::INFINITY, f64::min);
    let max = elevations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = elevations.iter().sum::<f64>() / elevations.len() as f64;
    Ok((min, max, mean))
}

fn check_classes(n: usize) -> Result<usize> {
    if n == 0 {
        return Err(Error::InvalidParameter {
            name: "hypsometry_classes",
            value: n.to_string(),
            reason: "need at least one class".into(),
        });
    }
    Ok(n)
}

/// Edges `[floor(min), next ..99, +step, ..., ceil(max)]`
fn fixed_step_edges(min: f64, max: f64, step: f64) -> Vec<f64> {
    let low = min.floor();
    let high = max.ceil();
    let first_upper = (low / step).floor() * step + step - 1.0;

    let mut edges = vec![low];
    if first_upper >= high {
        edges.push(high);
        return edges;
    }
    if first_upper > low {
        edges.push(first_upper);
    }
    let mut upper = first_upper;
    while upper < high {
        upper = (upper + step).min(high);
        edges.push(upper);
    }
    edges
}

fn equal_edges(min: f64, max: f64, n: usize) -> Vec<f64> {
    if max <= min {
        return vec![min, max];
    }
    (0..=n)
        .map(|i| if i == n { max } else { min + (max - min) * i as f64 / n as f64 })
        .collect()
}

/// Linear-interpolated quantile of sorted data
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn histogram(values: &[f64], edges: &[f64]) -> Vec<usize> {
    let bins = edges.len().saturating_sub(1);
    let mut counts = vec![0usize; bins];
    let (Some(&first), Some(&last)) = (edges.first(), edges.last()) else {
        return counts;
    };
    for &v in values {
        if bins == 0 || v < first || v > last {
            continue;
        }
        let idx = edges.partition_point(|&e| e <= v).saturating_sub(1).min(bins - 1);
        counts[idx] += 1;
    }
    counts
}

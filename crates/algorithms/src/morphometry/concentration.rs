//! Time of concentration estimates.
//!
//! Every empirical formula takes the same basin descriptors and returns
//! hours. A method whose inputs are out of its domain (zero slope, length or
//! relief) yields no value instead of infinity or NaN.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Feet per kilometer, for the Kirpich formula
const FEET_PER_KM: f64 = 1000.0 * 3.28084;

/// Basin descriptors shared by all methods
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationInputs {
    /// Basin area (km²)
    pub area_km2: f64,
    /// Main flow path length (km)
    pub length_km: f64,
    /// Basin relief, maximum minus minimum elevation (m)
    pub relief_m: f64,
    /// Mean main-path slope (m/m)
    pub slope: f64,
}

/// Named empirical methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConcentrationMethod {
    Giandotti,
    BransbyWilliams,
    California,
    Clark,
    Passini,
    PilgrimMcDermott,
    ValenciaZuluaga,
    Kirpich,
    Temez,
}

impl ConcentrationMethod {
    pub const ALL: [ConcentrationMethod; 9] = [
        ConcentrationMethod::Giandotti,
        ConcentrationMethod::BransbyWilliams,
        ConcentrationMethod::California,
        ConcentrationMethod::Clark,
        ConcentrationMethod::Passini,
        ConcentrationMethod::PilgrimMcDermott,
        ConcentrationMethod::ValenciaZuluaga,
        ConcentrationMethod::Kirpich,
        ConcentrationMethod::Temez,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ConcentrationMethod::Giandotti => "Giandotti",
            ConcentrationMethod::BransbyWilliams => "Bransby-Williams",
            ConcentrationMethod::California => "California Culvert Practice",
            ConcentrationMethod::Clark => "Clark",
            ConcentrationMethod::Passini => "Passini",
            ConcentrationMethod::PilgrimMcDermott => "Pilgrim-McDermott",
            ConcentrationMethod::ValenciaZuluaga => "Valencia-Zuluaga",
            ConcentrationMethod::Kirpich => "Kirpich",
            ConcentrationMethod::Temez => "Témez",
        }
    }

    /// Time of concentration in hours
    pub fn estimate(&self, inputs: &ConcentrationInputs) -> Option<f64> {
        let a = positive(inputs.area_km2)?;
        let l = inputs.length_km;
        let h = inputs.relief_m;
        let s = inputs.slope;

        let hours = match self {
            ConcentrationMethod::Giandotti => {
                let (l, h) = (positive(l)?, positive(h)?);
                (4.0 * a.sqrt() + 1.5 * l) / (0.8 * h.sqrt())
            }
            ConcentrationMethod::BransbyWilliams => {
                let (l, s) = (positive(l)?, positive(s)?);
                14.6 * l * a.powf(-0.1) * s.powf(-0.2) / 60.0
            }
            ConcentrationMethod::California => {
                let (l, h) = (positive(l)?, positive(h)?);
                (0.87075 * l.powi(3) / h).powf(0.385)
            }
            ConcentrationMethod::Clark => {
                let s = positive(s)?;
                0.335 * (a / s.sqrt()).powf(0.593)
            }
            ConcentrationMethod::Passini => {
                let (l, s) = (positive(l)?, positive(s)?);
                0.108 * (a * l).cbrt() / s.sqrt()
            }
            ConcentrationMethod::PilgrimMcDermott => 0.76 * a.powf(0.38),
            ConcentrationMethod::ValenciaZuluaga => {
                let (l, s) = (positive(l)?, positive(s)?);
                1.7694 * a.powf(0.325) * l.powf(-0.096) * (s * 100.0).powf(-0.29)
            }
            ConcentrationMethod::Kirpich => {
                let (l, s) = (positive(l)?, positive(s)?);
                0.0078 * (l * FEET_PER_KM).powf(0.77) * s.powf(-0.385) / 60.0
            }
            ConcentrationMethod::Temez => {
                let (l, s) = (positive(l)?, positive(s)?);
                0.3 * (l / s.powf(0.25)).powf(0.76)
            }
        };

        hours.is_finite().then_some(hours)
    }
}

impl fmt::Display for ConcentrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn positive(v: f64) -> Option<f64> {
    (v.is_finite() && v > 0.0).then_some(v)
}

/// One method's result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationEstimate {
    pub method: ConcentrationMethod,
    pub hours: Option<f64>,
    pub minutes: Option<f64>,
}

/// Statistics over the methods that produced a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationSummary {
    pub count: usize,
    pub mean_hours: f64,
    pub median_hours: f64,
    pub min_hours: f64,
    pub max_hours: f64,
}

/// All methods, in fixed order, with a summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationTimes {
    pub inputs: ConcentrationInputs,
    pub estimates: Vec<ConcentrationEstimate>,
    pub summary: Option<ConcentrationSummary>,
}

impl ConcentrationTimes {
    pub fn get(&self, method: ConcentrationMethod) -> Option<f64> {
        self.estimates
            .iter()
            .find(|e| e.method == method)
            .and_then(|e| e.hours)
    }
}

/// Evaluate every method on the same inputs
pub fn concentration_times(inputs: ConcentrationInputs) -> ConcentrationTimes {
    let estimates: Vec<ConcentrationEstimate> = ConcentrationMethod::ALL
        .iter()
        .map(|&method| {
            let hours = method.estimate(&inputs);
            ConcentrationEstimate {
                method,
                hours,
                minutes: hours.map(|h| h * 60.0),
            }
        })
        .collect();

    let mut values: Vec<f64> = estimates.iter().filter_map(|e| e.hours).collect();
    values.sort_by(f64::total_cmp);

    let summary = (!values.is_empty()).then(|| {
        let n = values.len();
        let median = if n % 2 == 1 {
            values[n / 2]
        } else {
            (values[n / 2 - 1] + values[n / 2]) / 2.0
        };
        ConcentrationSummary {
            count: n,
            mean_hours: values.iter().sum::<f64>() / n as f64,
            median_hours: median,
            min_hours: values[0],
            max_hours: values[n - 1],
        }
    });

    ConcentrationTimes {
        inputs,
        estimates,
        summary,
    }
}

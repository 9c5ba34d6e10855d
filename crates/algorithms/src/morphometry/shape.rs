//! Planform metrics: area, perimeter, compactness, form and sinuosity.

use crate::hydrology::FlowPath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Basin size class by area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AreaClass {
    #[serde(rename = "Microcuenca")]
    Micro,
    #[serde(rename = "Pequeña")]
    Small,
    #[serde(rename = "Intermedia-Pequeña")]
    IntermediateSmall,
    #[serde(rename = "Intermedia-Grande")]
    IntermediateLarge,
    #[serde(rename = "Grande")]
    Large,
    #[serde(rename = "Muy Grande")]
    VeryLarge,
}

impl AreaClass {
    pub fn from_km2(area: f64) -> Self {
        if area < 25.0 {
            AreaClass::Micro
        } else if area < 250.0 {
            AreaClass::Small
        } else if area < 500.0 {
            AreaClass::IntermediateSmall
        } else if area < 2500.0 {
            AreaClass::IntermediateLarge
        } else if area <= 5000.0 {
            AreaClass::Large
        } else {
            AreaClass::VeryLarge
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AreaClass::Micro => "Microcuenca",
            AreaClass::Small => "Pequeña",
            AreaClass::IntermediateSmall => "Intermedia-Pequeña",
            AreaClass::IntermediateLarge => "Intermedia-Grande",
            AreaClass::Large => "Grande",
            AreaClass::VeryLarge => "Muy Grande",
        }
    }
}

/// Basin shape class by form factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormClass {
    #[serde(rename = "Muy Alargada")]
    VeryElongated,
    #[serde(rename = "Alargada")]
    Elongated,
    #[serde(rename = "Lig. Alargada")]
    SlightlyElongated,
    #[serde(rename = "Intermedia")]
    Intermediate,
    #[serde(rename = "Lig. Achatada")]
    SlightlyFlattened,
    #[serde(rename = "Achatada")]
    Flattened,
    #[serde(rename = "Muy Achatada")]
    VeryFlattened,
    #[serde(rename = "Redonda")]
    Round,
}

impl FormClass {
    pub fn from_form_factor(ff: f64) -> Self {
        match ff {
            f if f < 0.22 => FormClass::VeryElongated,
            f if f < 0.30 => FormClass::Elongated,
            f if f < 0.37 => FormClass::SlightlyElongated,
            f if f < 0.45 => FormClass::Intermediate,
            f if f < 0.60 => FormClass::SlightlyFlattened,
            f if f < 0.80 => FormClass::Flattened,
            f if f < 1.20 => FormClass::VeryFlattened,
            _ => FormClass::Round,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FormClass::VeryElongated => "Muy Alargada",
            FormClass::Elongated => "Alargada",
            FormClass::SlightlyElongated => "Lig. Alargada",
            FormClass::Intermediate => "Intermedia",
            FormClass::SlightlyFlattened => "Lig. Achatada",
            FormClass::Flattened => "Achatada",
            FormClass::VeryFlattened => "Muy Achatada",
            FormClass::Round => "Redonda",
        }
    }
}

/// Main channel class by sinuosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinuosityClass {
    #[serde(rename = "Rectilíneo")]
    Straight,
    #[serde(rename = "Transicional")]
    Transitional,
    #[serde(rename = "Regular")]
    Regular,
    #[serde(rename = "Irregular")]
    Irregular,
    #[serde(rename = "Tortuoso")]
    Tortuous,
}

impl SinuosityClass {
    pub fn from_sinuosity(s: f64) -> Self {
        if s < 1.2 {
            SinuosityClass::Straight
        } else if s < 1.5 {
            SinuosityClass::Transitional
        } else if s < 1.7 {
            SinuosityClass::Regular
        } else if s < 2.1 {
            SinuosityClass::Irregular
        } else {
            SinuosityClass::Tortuous
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SinuosityClass::Straight => "Rectilíneo",
            SinuosityClass::Transitional => "Transicional",
            SinuosityClass::Regular => "Regular",
            SinuosityClass::Irregular => "Irregular",
            SinuosityClass::Tortuous => "Tortuoso",
        }
    }
}

macro_rules! impl_display_label {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        })*
    };
}

impl_display_label!(AreaClass, FormClass, SinuosityClass);

/// Planform metrics of a watershed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeMetrics {
    pub area_m2: f64,
    pub area_km2: f64,
    pub area_ha: f64,
    pub area_class: AreaClass,
    pub perimeter_m: f64,
    pub perimeter_km: f64,
    /// Gravelius compactness coefficient, 0.28 P / sqrt(A)
    pub compactness: Option<f64>,
    /// Longest flow path length
    pub main_length_km: f64,
    pub straight_length_km: f64,
    /// A / L²
    pub form_factor: Option<f64>,
    pub form_class: Option<FormClass>,
    pub sinuosity: Option<f64>,
    pub sinuosity_class: Option<SinuosityClass>,
}

/// Planform metrics from the watershed area, perimeter and main flow path
pub fn shape_metrics(area_m2: f64, perimeter_m: f64, path: &FlowPath) -> ShapeMetrics {
    let area_km2 = area_m2 / 1e6;
    let perimeter_km = perimeter_m / 1e3;
    let main_length_km = path.length_m / 1e3;

    let compactness = (area_km2 > 0.0).then(|| 0.28 * perimeter_km / area_km2.sqrt());
    let form_factor = (main_length_km > 0.0).then(|| area_km2 / (main_length_km * main_length_km));
    let sinuosity = path.sinuosity();

    ShapeMetrics {
        area_m2,
        area_km2,
        area_ha: area_m2 / 1e4,
        area_class: AreaClass::from_km2(area_km2),
        perimeter_m,
        perimeter_km,
        compactness,
        main_length_km,
        straight_length_km: path.straight_length_m / 1e3,
        form_factor,
        form_class: form_factor.map(FormClass::from_form_factor),
        sinuosity,
        sinuosity_class: sinuosity.map(SinuosityClass::from_sinuosity),
    }
}

//! Vector features handed to external exporters.
//!
//! Geometries are `geo_types` in the grid's map reference; attributes are an
//! ordered map so serialized output is stable across runs.

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => f.write_str("-"),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Float(v) => write!(f, "{:.4}", v),
            AttributeValue::String(s) => f.write_str(s),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        if v.is_finite() {
            AttributeValue::Float(v)
        } else {
            AttributeValue::Null
        }
    }
}

impl From<Option<f64>> for AttributeValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(AttributeValue::Null, AttributeValue::from)
    }
}

impl From<usize> for AttributeValue {
    fn from(v: usize) -> Self {
        AttributeValue::Int(v as i64)
    }
}

impl From<u32> for AttributeValue {
    fn from(v: u32) -> Self {
        AttributeValue::Int(v as i64)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

/// A geometry with attributes, tagged with the output layer it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub layer: String,
    pub geometry: Option<Geometry<f64>>,
    pub properties: BTreeMap<String, AttributeValue>,
}

impl Feature {
    pub fn new(layer: impl Into<String>, geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            layer: layer.into(),
            geometry: Some(geometry.into()),
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// Collection of features across layers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Features of one layer, in insertion order
    pub fn layer<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Feature> + 'a {
        self.features.iter().filter(move |f| f.layer == name)
    }

    /// Distinct layer names, in first-seen order
    pub fn layer_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for f in &self.features {
            if !names.contains(&f.layer.as_str()) {
                names.push(&f.layer);
            }
        }
        names
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::Point;

    #[test]
    fn test_layers() {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new("pour_point", Point::new(-74.1, 4.6)).with_property("accumulation", 12.0));
        fc.push(Feature::new("snap_point", Point::new(-74.1, 4.61)).with_property("distance_m", 30.0));
        fc.push(Feature::new("snap_point", Point::new(-74.1, 4.62)));

        assert_eq!(fc.len(), 3);
        assert_eq!(fc.layer("snap_point").count(), 2);
        assert_eq!(fc.layer_names(), vec!["pour_point", "snap_point"]);
    }

    #[test]
    fn test_non_finite_becomes_null() {
        let f = Feature::new("watershed", Point::new(0.0, 0.0))
            .with_property("form_factor", f64::NAN)
            .with_property("order", 3u32)
            .with_property("class", "Microcuenca");
        assert_eq!(f.get_property("form_factor"), Some(&AttributeValue::Null));
        assert_eq!(f.get_property("order"), Some(&AttributeValue::Int(3)));
    }

    #[test]
    fn test_display() {
        assert_eq!(AttributeValue::Float(1.5).to_string(), "1.5000");
        assert_eq!(AttributeValue::Null.to_string(), "-");
        assert_eq!(AttributeValue::from("Alta").to_string(), "Alta");
    }
}

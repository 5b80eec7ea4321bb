//! Vector data structures: features, attributes and feature collections

use crate::crs::CRS;
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// True for `Null` and for NaN floats
    pub fn is_null(&self) -> bool {
        match self {
            AttributeValue::Null => true,
            AttributeValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the value. `None` for nulls and non-numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    /// Name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Null => "null",
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Int(_) => "int",
            AttributeValue::Float(_) => "float",
            AttributeValue::String(_) => "string",
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<Option<f64>> for AttributeValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(AttributeValue::Null, AttributeValue::Float)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
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

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

/// Identifier of a feature within its collection.
///
/// Only integers and strings identify features; a float attribute is
/// accepted when it holds an integral value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Int(i64),
    Text(String),
}

impl FeatureId {
    /// Interpret an attribute value as an identifier
    pub fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Int(v) => Some(FeatureId::Int(*v)),
            AttributeValue::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
                Some(FeatureId::Int(*v as i64))
            }
            AttributeValue::String(s) => Some(FeatureId::Text(s.clone())),
            _ => None,
        }
    }

    /// Convert back into an attribute value
    pub fn to_attribute(&self) -> AttributeValue {
        match self {
            FeatureId::Int(v) => AttributeValue::Int(*v),
            FeatureId::Text(s) => AttributeValue::String(s.clone()),
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::Int(v) => write!(f, "{}", v),
            FeatureId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for FeatureId {
    fn from(v: i64) -> Self {
        FeatureId::Int(v)
    }
}

impl From<&str> for FeatureId {
    fn from(v: &str) -> Self {
        FeatureId::Text(v.to_string())
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes, ordered by name
    pub properties: BTreeMap<String, AttributeValue>,
    /// Optional format-level feature ID (GeoJSON `id` member)
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: Some(geometry.into()),
            properties: BTreeMap::new(),
            id: None,
        }
    }

    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: BTreeMap::new(),
            id: None,
        }
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set_property(key, value.into());
        self
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// Collection of features sharing one CRS
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    /// `None` when the layer carries no CRS metadata
    pub crs: Option<CRS>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: CRS) -> Self {
        self.crs = Some(crs);
        self
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

    /// Union of attribute names over all features, sorted
    pub fn attribute_names(&self) -> BTreeSet<&str> {
        self.features
            .iter()
            .flat_map(|f| f.properties.keys().map(String::as_str))
            .collect()
    }

    /// A column exists when at least one feature carries it.
    ///
    /// Features lacking the attribute read it as null.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.features.iter().any(|f| f.properties.contains_key(name))
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
            crs: None,
        }
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

//! Parameters for areal interpolation

use arealis_core::{Error, Result, CRS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Denominator used for extensive variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightPolicy {
    /// Sum of the source's overlap with all targets. Targets receive all of
    /// the source's value even when they only cover part of it.
    #[default]
    Sum,
    /// Full area of the source geometry. Uncovered parts of a source keep
    /// their share of the value, so totals are preserved relative to the
    /// source. Not valid together with intensive variables.
    Total,
}

impl fmt::Display for WeightPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightPolicy::Sum => write!(f, "sum"),
            WeightPolicy::Total => write!(f, "total"),
        }
    }
}

/// Handling of sources whose value is null in a requested variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NullSourcePolicy {
    /// Keep every source. Null values add nothing to sums but their
    /// overlap still counts in denominators, so intensive averages are
    /// diluted by null-valued overlap.
    #[default]
    Keep,
    /// Remove a source from the overlap relation when it is null in any
    /// requested variable; one filtered relation serves all variables.
    DropAny,
    /// Remove a source only from the relation of the variables in which
    /// it is null.
    DropPerVariable,
}

impl NullSourcePolicy {
    /// Map a plain "drop null sources" switch to a policy
    pub fn from_flag(drop: bool) -> Self {
        if drop {
            NullSourcePolicy::DropAny
        } else {
            NullSourcePolicy::Keep
        }
    }
}

/// How candidate (source, target) pairs are found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapStrategy {
    /// R-tree over target envelopes; only envelope hits are tested
    #[default]
    Indexed,
    /// Test every (source, target) pair
    Pairwise,
}

/// Parameters for areal-weighted interpolation
///
/// Loadable from JSON; missing fields take their defaults:
///
/// ```json
/// { "target_id": "tract", "source_id": "block", "extensive": ["pop"],
///   "weight": "total", "working_crs": "EPSG:32633" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterpolationParams {
    /// Identifier column of the target layer
    pub target_id: String,
    /// Identifier column of the source layer
    pub source_id: String,
    /// Additive variables (counts, totals)
    pub extensive: Vec<String>,
    /// Density or rate variables (area-weighted average)
    pub intensive: Vec<String>,
    /// Denominator policy for extensive variables
    pub weight: WeightPolicy,
    /// Emit every target, with nulls where nothing overlapped (outer join)
    pub keep_unmatched: bool,
    /// Treatment of sources with null values
    pub null_sources: NullSourcePolicy,
    /// Reproject both layers into this CRS before computing areas
    pub working_crs: Option<CRS>,
    /// Attach target geometries to the result
    pub emit_geometry: bool,
    /// Candidate search strategy for the overlap computation
    pub overlap: OverlapStrategy,
}

impl Default for InterpolationParams {
    fn default() -> Self {
        Self {
            target_id: "id".to_string(),
            source_id: "id".to_string(),
            extensive: Vec::new(),
            intensive: Vec::new(),
            weight: WeightPolicy::Sum,
            keep_unmatched: true,
            null_sources: NullSourcePolicy::Keep,
            working_crs: None,
            emit_geometry: true,
            overlap: OverlapStrategy::Indexed,
        }
    }
}

impl InterpolationParams {
    /// Parameters with the given identifier columns and all other defaults
    pub fn new(target_id: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            source_id: source_id.into(),
            ..Default::default()
        }
    }

    /// Parse parameters from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidParameter {
            name: "params",
            value: "<json>".into(),
            reason: e.to_string(),
        })
    }

    /// Load parameters from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// All requested variables, extensive first
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.extensive
            .iter()
            .chain(self.intensive.iter())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = InterpolationParams::default();
        assert_eq!(p.weight, WeightPolicy::Sum);
        assert!(p.keep_unmatched);
        assert!(p.emit_geometry);
        assert_eq!(p.null_sources, NullSourcePolicy::Keep);
        assert_eq!(p.overlap, OverlapStrategy::Indexed);
        assert!(p.working_crs.is_none());
    }

    #[test]
    fn test_from_json() {
        let p = InterpolationParams::from_json_str(
            r#"{"target_id": "tract", "extensive": ["pop", "jobs"], "intensive": [],
                "weight": "total", "null_sources": "drop-per-variable",
                "working_crs": "EPSG:32633", "overlap": "pairwise", "keep_unmatched": false}"#,
        )
        .unwrap();
        assert_eq!(p.target_id, "tract");
        assert_eq!(p.source_id, "id");
        assert_eq!(p.variables().collect::<Vec<_>>(), vec!["pop", "jobs"]);
        assert_eq!(p.weight, WeightPolicy::Total);
        assert_eq!(p.null_sources, NullSourcePolicy::DropPerVariable);
        assert_eq!(p.working_crs, Some(CRS::from_epsg(32633)));
        assert_eq!(p.overlap, OverlapStrategy::Pairwise);
        assert!(!p.keep_unmatched);
    }

    #[test]
    fn test_from_json_rejects_unknown_fields() {
        let err = InterpolationParams::from_json_str(r#"{"wieght": "sum"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "params", .. }));
    }

    #[test]
    fn test_null_policy_flag() {
        assert_eq!(NullSourcePolicy::from_flag(true), NullSourcePolicy::DropAny);
        assert_eq!(NullSourcePolicy::from_flag(false), NullSourcePolicy::Keep);
    }
}

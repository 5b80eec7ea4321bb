//! Result assembly: joining interpolated values back onto targets

use super::plan::{InterpolationPlan, JoinKind};
use arealis_core::{AttributeValue, Feature, FeatureCollection, FeatureId, CRS};
use geo::Geometry;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// An interpolated variable replaced a target attribute of the same name
    ColumnOverwritten,
    /// A source with zero area contributed nothing under the `total` policy
    ZeroAreaSource,
    /// Areas were measured in a geographic CRS, in square degrees
    GeographicAreas,
}

/// Recoverable condition reported alongside a result
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// One output row, keyed by target identifier
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedRecord {
    pub id: FeatureId,
    pub geometry: Option<Geometry<f64>>,
    /// Target attributes plus one entry per interpolated variable
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl InterpolatedRecord {
    /// Interpolated (or passthrough) numeric value; `None` when null
    pub fn value(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).and_then(AttributeValue::as_f64)
    }
}

/// Output of one interpolation call. Rows follow target input order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub target_id: String,
    pub variables: Vec<String>,
    pub records: Vec<InterpolatedRecord>,
    pub crs: Option<CRS>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &FeatureId) -> Option<&InterpolatedRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Value of `variable` for target `id`
    pub fn value(&self, id: &FeatureId, variable: &str) -> Option<f64> {
        self.get(id).and_then(|r| r.value(variable))
    }

    /// Every (target id, variable, value) triple, sorted by id then variable
    pub fn triples(&self) -> Vec<(FeatureId, String, Option<f64>)> {
        let mut out: Vec<_> = self
            .records
            .iter()
            .flat_map(|r| {
                self.variables
                    .iter()
                    .map(move |v| (r.id.clone(), v.clone(), r.value(v)))
            })
            .collect();
        out.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        out
    }

    /// Sum of the non-null values of `variable`
    pub fn total(&self, variable: &str) -> f64 {
        self.records.iter().filter_map(|r| r.value(variable)).sum()
    }

    pub fn has_diagnostic(&self, kind: DiagnosticKind) -> bool {
        self.diagnostics.iter().any(|d| d.kind == kind)
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        self.clone().into_feature_collection()
    }

    pub fn into_feature_collection(self) -> FeatureCollection {
        let features = self
            .records
            .into_iter()
            .map(|r| Feature {
                geometry: r.geometry,
                properties: r.attributes,
                id: Some(r.id.to_string()),
            })
            .collect();
        FeatureCollection {
            features,
            crs: self.crs,
        }
    }
}

/// Join per-variable target values onto the target layer.
///
/// `values[k][j]` is the value of variable `k` for target `j`; `matched[j]`
/// tells whether any source contributed to target `j`.
pub(crate) fn assemble(
    plan: &InterpolationPlan,
    target: &FeatureCollection,
    ids: Vec<FeatureId>,
    geometries: &[Option<Cow<'_, Geometry<f64>>>],
    values: &[Vec<Option<f64>>],
    matched: &[bool],
    crs: Option<CRS>,
    mut diagnostics: Vec<Diagnostic>,
) -> ResultSet {
    for name in &plan.overwritten {
        tracing::warn!(column = %name, "interpolated variable overwrites target attribute");
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::ColumnOverwritten,
            format!("target attribute `{name}` replaced by interpolated values"),
        ));
    }

    let records: Vec<InterpolatedRecord> = ids
        .into_iter()
        .enumerate()
        .filter(|(j, _)| plan.join == JoinKind::Outer || matched[*j])
        .map(|(j, id)| {
            let mut attributes = target.features[j].properties.clone();
            attributes.insert(plan.target_id.clone(), id.to_attribute());
            for (k, var) in plan.variables.iter().enumerate() {
                attributes.insert(var.name.clone(), values[k][j].into());
            }
            let geometry = if plan.emit_geometry {
                geometries[j].as_deref().cloned()
            } else {
                None
            };
            InterpolatedRecord {
                id,
                geometry,
                attributes,
            }
        })
        .collect();

    tracing::debug!(rows = records.len(), targets = target.len(), "result assembled");
    ResultSet {
        target_id: plan.target_id.clone(),
        variables: plan.variable_names(),
        records,
        crs,
        diagnostics,
    }
}

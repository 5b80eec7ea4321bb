//! Typed interpolation plan
//!
//! Validates parameters against both layers and records, as plain data,
//! every decision the execution needs: how geometries are aligned, which
//! sources are filtered, how each variable is aggregated and normalized,
//! and how targets are joined to results. Building a plan performs no
//! geometry work, so every configuration and schema error surfaces before
//! the geometry backend is called.

use super::aggregate::{Aggregator, ExtensiveAggregator, IntensiveAggregator};
use super::params::{InterpolationParams, NullSourcePolicy, OverlapStrategy, WeightPolicy};
use arealis_core::crs::ensure_same_crs;
use arealis_core::{Error, FeatureCollection, Result, CRS};
use std::collections::HashSet;
use std::fmt;

/// How layer geometries are brought into one CRS
#[derive(Debug, Clone, PartialEq)]
pub enum Alignment {
    /// Layers already share a CRS (or both have none)
    AsIs,
    /// Reproject both layers into `to`
    Reproject { to: CRS },
}

/// Which sources enter the overlap relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFilter {
    None,
    DropNullAny,
    DropNullPerVariable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Extensive,
    Intensive,
}

/// Normalizing area for converting an overlap into a weight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenominatorRule {
    /// Σ overlap of the source with all targets
    SourceOverlapSum,
    /// Full area of the source geometry
    SourceArea,
    /// Σ overlap of the target with all sources
    TargetOverlapSum,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariablePlan {
    pub name: String,
    pub kind: VariableKind,
    pub denominator: DenominatorRule,
}

impl VariablePlan {
    /// Aggregation strategy for this variable
    pub fn aggregator(&self) -> Box<dyn Aggregator> {
        match (self.kind, self.denominator) {
            (VariableKind::Extensive, DenominatorRule::SourceArea) => {
                Box::new(ExtensiveAggregator::new(WeightPolicy::Total))
            }
            (VariableKind::Extensive, _) => Box::new(ExtensiveAggregator::new(WeightPolicy::Sum)),
            (VariableKind::Intensive, _) => Box::new(IntensiveAggregator),
        }
    }
}

/// How targets are joined to interpolated values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Every target, nulls where nothing overlapped
    Outer,
    /// Only targets overlapped by at least one source
    Inner,
}

/// A validated, executable description of one interpolation call
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationPlan {
    pub target_id: String,
    pub source_id: String,
    pub alignment: Alignment,
    pub filter: SourceFilter,
    pub overlap: OverlapStrategy,
    pub variables: Vec<VariablePlan>,
    pub join: JoinKind,
    pub emit_geometry: bool,
    /// Target attributes that interpolated values replace
    pub overwritten: Vec<String>,
}

impl InterpolationPlan {
    /// Validate `params` against the layers and build the plan.
    ///
    /// Checks, in order: requested variables, weight policy, identifier
    /// columns, CRS agreement, then column existence. No geometry is read.
    pub fn build(
        params: &InterpolationParams,
        target: &FeatureCollection,
        source: &FeatureCollection,
    ) -> Result<Self> {
        if params.extensive.is_empty() && params.intensive.is_empty() {
            return Err(Error::config("no extensive or intensive variables requested"));
        }

        if params.weight == WeightPolicy::Total && !params.intensive.is_empty() {
            return Err(Error::config(format!(
                "weight policy `total` cannot be used with intensive variables ({})",
                params.intensive.join(", ")
            )));
        }

        let mut seen = HashSet::new();
        for name in params.variables() {
            if name.is_empty() {
                return Err(Error::config("empty variable name"));
            }
            if !seen.insert(name) {
                return Err(Error::config(format!("variable `{name}` requested more than once")));
            }
        }

        if params.target_id.is_empty() || params.source_id.is_empty() {
            return Err(Error::config("identifier column names must not be empty"));
        }
        if seen.contains(params.target_id.as_str()) {
            return Err(Error::config(format!(
                "variable `{}` would replace the target identifier column",
                params.target_id
            )));
        }

        let alignment = match &params.working_crs {
            Some(crs) => {
                if target.crs.is_none() {
                    return Err(Error::MissingCrs { side: "target" });
                }
                if source.crs.is_none() {
                    return Err(Error::MissingCrs { side: "source" });
                }
                Alignment::Reproject { to: crs.clone() }
            }
            None => {
                ensure_same_crs(target.crs.as_ref(), source.crs.as_ref())?;
                Alignment::AsIs
            }
        };

        require_column(target, &params.target_id, "target")?;
        require_column(source, &params.source_id, "source")?;
        for name in params.variables() {
            require_column(source, name, "source")?;
        }

        let extensive_rule = match params.weight {
            WeightPolicy::Sum => DenominatorRule::SourceOverlapSum,
            WeightPolicy::Total => DenominatorRule::SourceArea,
        };
        let variables = params
            .extensive
            .iter()
            .map(|name| VariablePlan {
                name: name.clone(),
                kind: VariableKind::Extensive,
                denominator: extensive_rule,
            })
            .chain(params.intensive.iter().map(|name| VariablePlan {
                name: name.clone(),
                kind: VariableKind::Intensive,
                denominator: DenominatorRule::TargetOverlapSum,
            }))
            .collect();

        let overwritten = params
            .variables()
            .filter(|name| target.has_attribute(name))
            .map(str::to_string)
            .collect();

        Ok(Self {
            target_id: params.target_id.clone(),
            source_id: params.source_id.clone(),
            alignment,
            filter: match params.null_sources {
                NullSourcePolicy::Keep => SourceFilter::None,
                NullSourcePolicy::DropAny => SourceFilter::DropNullAny,
                NullSourcePolicy::DropPerVariable => SourceFilter::DropNullPerVariable,
            },
            overlap: params.overlap,
            variables,
            join: if params.keep_unmatched {
                JoinKind::Outer
            } else {
                JoinKind::Inner
            },
            emit_geometry: params.emit_geometry,
            overwritten,
        })
    }

    /// Whether any variable needs full source areas
    pub fn needs_source_area(&self) -> bool {
        self.variables
            .iter()
            .any(|v| v.denominator == DenominatorRule::SourceArea)
    }

    /// CRS of the result layer
    pub fn output_crs(&self, target: &FeatureCollection) -> Option<CRS> {
        match &self.alignment {
            Alignment::AsIs => target.crs.clone(),
            Alignment::Reproject { to } => Some(to.clone()),
        }
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }
}

/// A column must exist in a non-empty layer. Empty layers have no rows to
/// check and pass.
fn require_column(layer: &FeatureCollection, name: &str, side: &str) -> Result<()> {
    if layer.is_empty() || layer.has_attribute(name) {
        Ok(())
    } else {
        Err(Error::schema(format!("column `{name}` not found in {side} layer")))
    }
}

impl fmt::Display for InterpolationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alignment {
            Alignment::AsIs => write!(f, "align=as-is")?,
            Alignment::Reproject { to } => write!(f, "align=reproject({to})")?,
        }
        let filter = match self.filter {
            SourceFilter::None => "none",
            SourceFilter::DropNullAny => "drop-null-any",
            SourceFilter::DropNullPerVariable => "drop-null-per-variable",
        };
        write!(f, " filter={filter} overlap={:?}", self.overlap)?;
        for v in &self.variables {
            let kind = match v.kind {
                VariableKind::Extensive => "ext",
                VariableKind::Intensive => "int",
            };
            let denom = match v.denominator {
                DenominatorRule::SourceOverlapSum => "src-sum",
                DenominatorRule::SourceArea => "src-area",
                DenominatorRule::TargetOverlapSum => "tgt-sum",
            };
            write!(f, " {}[{kind}/{denom}]", v.name)?;
        }
        let join = match self.join {
            JoinKind::Outer => "outer",
            JoinKind::Inner => "inner",
        };
        write!(f, " join={join} geometry={}", self.emit_geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arealis_core::{ErrorKind, Feature};
    use geo::polygon;

    fn layer(id_col: &str, attrs: &[&str]) -> FeatureCollection {
        let mut f = Feature::new(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)])
            .with_property(id_col, 1i64);
        for a in attrs {
            f = f.with_property(*a, 1.0);
        }
        std::iter::once(f).collect()
    }

    fn params(ext: &[&str], int: &[&str]) -> InterpolationParams {
        InterpolationParams {
            extensive: ext.iter().map(|s| s.to_string()).collect(),
            intensive: int.iter().map(|s| s.to_string()).collect(),
            ..InterpolationParams::new("tid", "sid")
        }
    }

    #[test]
    fn test_build_plan() {
        let target = layer("tid", &["pop"]);
        let source = layer("sid", &["pop", "dens"]);
        let plan = InterpolationPlan::build(&params(&["pop"], &["dens"]), &target, &source).unwrap();

        assert_eq!(plan.alignment, Alignment::AsIs);
        assert_eq!(plan.filter, SourceFilter::None);
        assert_eq!(plan.join, JoinKind::Outer);
        assert_eq!(plan.variables.len(), 2);
        assert_eq!(plan.variables[0].denominator, DenominatorRule::SourceOverlapSum);
        assert_eq!(plan.variables[1].denominator, DenominatorRule::TargetOverlapSum);
        assert_eq!(plan.overwritten, vec!["pop".to_string()]);
        assert!(!plan.needs_source_area());
        assert_eq!(
            plan.to_string(),
            "align=as-is filter=none overlap=Indexed pop[ext/src-sum] dens[int/tgt-sum] join=outer geometry=true"
        );
    }

    #[test]
    fn test_total_policy_uses_source_area() {
        let p = InterpolationParams {
            weight: WeightPolicy::Total,
            ..params(&["pop"], &[])
        };
        let plan = InterpolationPlan::build(&p, &layer("tid", &[]), &layer("sid", &["pop"])).unwrap();
        assert_eq!(plan.variables[0].denominator, DenominatorRule::SourceArea);
        assert!(plan.needs_source_area());
    }

    #[test]
    fn test_configuration_errors() {
        let t = layer("tid", &[]);
        let s = layer("sid", &["pop", "dens"]);

        let no_vars = InterpolationPlan::build(&params(&[], &[]), &t, &s).unwrap_err();
        assert_eq!(no_vars.kind(), ErrorKind::Configuration);

        let total_intensive = InterpolationParams {
            weight: WeightPolicy::Total,
            ..params(&["pop"], &["dens"])
        };
        let err = InterpolationPlan::build(&total_intensive, &t, &s).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let dup = InterpolationPlan::build(&params(&["pop"], &["pop"]), &t, &s).unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::Configuration);

        let shadow = InterpolationPlan::build(&params(&["tid"], &[]), &t, &layer("sid", &["tid"])).unwrap_err();
        assert_eq!(shadow.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_schema_errors() {
        let t = layer("tid", &[]);
        let s = layer("sid", &["pop"]);

        let missing_var = InterpolationPlan::build(&params(&["jobs"], &[]), &t, &s).unwrap_err();
        assert_eq!(missing_var.kind(), ErrorKind::Schema);

        let wrong_id = InterpolationPlan::build(&params(&["pop"], &[]), &layer("other", &[]), &s).unwrap_err();
        assert_eq!(wrong_id.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_crs_rules() {
        let p = params(&["pop"], &[]);
        let t = layer("tid", &[]).with_crs(CRS::from_epsg(32633));
        let s = layer("sid", &["pop"]);

        // One side known, the other not
        assert!(matches!(
            InterpolationPlan::build(&p, &t, &s),
            Err(Error::MissingCrs { side: "source" })
        ));

        // Mismatch
        let s3857 = s.clone().with_crs(CRS::web_mercator());
        assert!(matches!(InterpolationPlan::build(&p, &t, &s3857), Err(Error::CrsMismatch(..))));

        // Working CRS resolves the mismatch
        let pw = InterpolationParams {
            working_crs: Some(CRS::from_epsg(32633)),
            ..p.clone()
        };
        let plan = InterpolationPlan::build(&pw, &t, &s3857).unwrap();
        assert_eq!(plan.alignment, Alignment::Reproject { to: CRS::from_epsg(32633) });
        assert_eq!(plan.output_crs(&t), Some(CRS::from_epsg(32633)));

        // Working CRS needs CRS metadata on both sides
        assert!(matches!(
            InterpolationPlan::build(&pw, &t, &s),
            Err(Error::MissingCrs { side: "source" })
        ));
    }
}

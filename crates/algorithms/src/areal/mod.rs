//! Areal-weighted interpolation
//!
//! Redistributes attribute values from source polygons to target polygons
//! in proportion to their overlap area.
//!
//! # Algorithm
//!
//! 1. Validate parameters against both layers and build an
//!    [`InterpolationPlan`] (no geometry work).
//! 2. Align both layers to one CRS, reprojecting if a working CRS is set.
//! 3. Compute the overlap relation: one `(source, target, area)` record per
//!    intersecting pair.
//! 4. Derive denominators and aggregate each variable:
//!
//! ```text
//! extensive, sum:    v(t) = Σ_s v(s) * a(s,t) / Σ_t' a(s,t')
//! extensive, total:  v(t) = Σ_s v(s) * a(s,t) / area(s)
//! intensive:         v(t) = Σ_s v(s) * a(s,t) / Σ_s' a(s',t)
//! ```
//!
//! 5. Join the values back onto the targets.
//!
//! Under `sum` a source hands all of its value to the targets that cover
//! it; under `total` only the covered fraction is transferred, so the
//! output never exceeds the input in either case.
//!
//! # Example
//!
//! ```
//! use arealis_algorithms::areal::{interpolate, InterpolationParams};
//! use arealis_core::{Feature, FeatureCollection, FeatureId, GeoBackend};
//! use geo::{Polygon, Rect};
//!
//! let cell = |x0: f64, w: f64| Polygon::from(Rect::new((x0, 0.0), (x0 + w, 10.0)));
//! let source: FeatureCollection = std::iter::once(
//!     Feature::new(cell(0.0, 10.0)).with_property("id", 1i64).with_property("pop", 200.0),
//! )
//! .collect();
//! let target: FeatureCollection = [(1i64, 0.0), (2, 5.0)]
//!     .into_iter()
//!     .map(|(id, x0)| Feature::new(cell(x0, 5.0)).with_property("id", id))
//!     .collect();
//!
//! let params = InterpolationParams { extensive: vec!["pop".into()], ..Default::default() };
//! let result = interpolate(&GeoBackend, &target, &source, &params).unwrap();
//! let pop = result.value(&FeatureId::Int(1), "pop").unwrap();
//! assert!((pop - 100.0).abs() < 1e-6);
//! ```

mod aggregate;
mod assemble;
mod denominator;
mod input;
mod overlap;
mod params;
mod plan;
mod session;

pub use aggregate::{Aggregator, ExtensiveAggregator, IntensiveAggregator};
pub use assemble::{Diagnostic, DiagnosticKind, InterpolatedRecord, ResultSet};
pub use denominator::{source_areas, Denominators};
pub use input::{collect_ids, collect_values};
pub use overlap::{compute_overlaps, OverlapRecord, OverlapRelation};
pub use params::{InterpolationParams, NullSourcePolicy, OverlapStrategy, WeightPolicy};
pub use plan::{
    Alignment, DenominatorRule, InterpolationPlan, JoinKind, SourceFilter, VariableKind,
    VariablePlan,
};
pub use session::{interpolate_layers, Output, Session, Sink};

use arealis_core::{
    Algorithm, Error, FeatureCollection, GeoBackend, GeometryBackend, Result, CRS,
};
use geo::Geometry;
use std::borrow::Cow;

/// Interpolate `params`' variables from `source` onto `target`.
///
/// Configuration and schema errors are returned before the backend is
/// called. Degenerate inputs (zero areas, unmatched targets) give nulls.
pub fn interpolate<B: GeometryBackend + ?Sized>(
    backend: &B,
    target: &FeatureCollection,
    source: &FeatureCollection,
    params: &InterpolationParams,
) -> Result<ResultSet> {
    let plan = InterpolationPlan::build(params, target, source)?;
    execute(backend, &plan, target, source)
}

/// Run a plan built for these two layers
pub fn execute<B: GeometryBackend + ?Sized>(
    backend: &B,
    plan: &InterpolationPlan,
    target: &FeatureCollection,
    source: &FeatureCollection,
) -> Result<ResultSet> {
    tracing::debug!(%plan, targets = target.len(), sources = source.len(), "interpolation plan");

    let target_ids = collect_ids(target, &plan.target_id, "target")?;
    collect_ids(source, &plan.source_id, "source")?;
    let values = plan
        .variables
        .iter()
        .map(|v| collect_values(source, &v.name))
        .collect::<Result<Vec<_>>>()?;

    let target_geoms = align(backend, target, &plan.alignment, "target")?;
    let source_geoms = align(backend, source, &plan.alignment, "source")?;

    let sources: Vec<Option<&Geometry<f64>>> = source_geoms
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let dropped =
                plan.filter == SourceFilter::DropNullAny && values.iter().any(|v| v[i].is_none());
            if dropped {
                None
            } else {
                g.as_deref()
            }
        })
        .collect();
    let targets: Vec<Option<&Geometry<f64>>> = target_geoms.iter().map(|g| g.as_deref()).collect();

    let relation = compute_overlaps(backend, &sources, &targets, plan.overlap)?;

    let mut diagnostics = Vec::new();
    let crs = plan.output_crs(target);
    if let Some(geographic) = crs.as_ref().filter(|c| c.is_geographic()) {
        tracing::warn!(crs = %geographic, "overlap areas are in square degrees");
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::GeographicAreas,
            format!("areas measured in geographic CRS {geographic}"),
        ));
    }
    let areas = if plan.needs_source_area() {
        let areas = source_areas(backend, &sources)?;
        for (i, area) in areas.iter().enumerate() {
            if sources[i].is_some() && *area <= 0.0 {
                tracing::warn!(row = i, "source has zero area; its values are not transferred");
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::ZeroAreaSource,
                    format!("source in row {i} has zero area"),
                ));
            }
        }
        Some(areas)
    } else {
        None
    };

    let shared = Denominators::from_relation(&relation, areas.as_deref());
    let mut matched = vec![false; target.len()];
    let mut columns = Vec::with_capacity(plan.variables.len());
    for (var, vals) in plan.variables.iter().zip(&values) {
        let aggregator = var.aggregator();
        let column = if plan.filter == SourceFilter::DropNullPerVariable {
            let filtered = relation.retain_sources(|i| vals[i].is_some());
            let denoms = Denominators::from_relation(&filtered, areas.as_deref());
            mark_matched(&mut matched, &filtered);
            aggregator.aggregate(&filtered, vals, &denoms)
        } else {
            aggregator.aggregate(&relation, vals, &shared)
        };
        tracing::debug!(variable = %var.name, aggregator = aggregator.name(), "variable aggregated");
        columns.push(column);
    }
    if plan.filter != SourceFilter::DropNullPerVariable {
        mark_matched(&mut matched, &relation);
    }

    Ok(assemble::assemble(
        plan,
        target,
        target_ids,
        &target_geoms,
        &columns,
        &matched,
        crs,
        diagnostics,
    ))
}

fn mark_matched(matched: &mut [bool], relation: &OverlapRelation) {
    for (m, hit) in matched.iter_mut().zip(relation.matched_targets()) {
        *m |= hit;
    }
}

/// Layer geometries in the plan's working CRS
fn align<'a, B: GeometryBackend + ?Sized>(
    backend: &B,
    layer: &'a FeatureCollection,
    alignment: &Alignment,
    side: &'static str,
) -> Result<Vec<Option<Cow<'a, Geometry<f64>>>>> {
    let to = match alignment {
        Alignment::AsIs => {
            return Ok(layer
                .iter()
                .map(|f| f.geometry.as_ref().map(Cow::Borrowed))
                .collect())
        }
        Alignment::Reproject { to } => to,
    };
    let from: &CRS = layer.crs.as_ref().ok_or(Error::MissingCrs { side })?;
    if from.is_equivalent(to) {
        return align(backend, layer, &Alignment::AsIs, side);
    }

    tracing::debug!(side, from = %from, to = %to, "reprojecting layer");
    layer
        .iter()
        .map(|f| {
            f.geometry
                .as_ref()
                .map(|g| backend.reproject(g, from, to).map(Cow::Owned))
                .transpose()
        })
        .collect()
}

/// Both layers of an interpolation call
#[derive(Debug, Clone)]
pub struct InterpolationInput {
    pub target: FeatureCollection,
    pub source: FeatureCollection,
}

/// Areal-weighted interpolation as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct ArealInterpolation<B = GeoBackend> {
    backend: B,
}

impl<B: GeometryBackend> ArealInterpolation<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

impl<B: GeometryBackend> Algorithm for ArealInterpolation<B> {
    type Input = InterpolationInput;
    type Output = ResultSet;
    type Params = InterpolationParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ArealInterpolation"
    }

    fn description(&self) -> &'static str {
        "Redistribute source polygon attributes to target polygons by overlap area"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        interpolate(&self.backend, &input.target, &input.source, &params)
    }
}

//! Mass redistribution strategies
//!
//! Both strategies consume the same overlap relation. For each record
//! (s, t, a) they add `value(s) * a / denom` to target `t`, and differ only
//! in which denominator they use:
//!
//! ```text
//! extensive:  value(t) = Σ_s value(s) * a(s,t) / denom(s)
//! intensive:  value(t) = Σ_s value(s) * a(s,t) / denom(t)
//! ```
//!
//! Terms with a null value or a missing denominator are skipped. A target
//! without any remaining term is null.

use super::denominator::Denominators;
use super::overlap::OverlapRelation;
use super::params::WeightPolicy;

/// Per-variable aggregation strategy
pub trait Aggregator: Send + Sync {
    fn name(&self) -> &'static str;

    /// One value per target, in target order
    fn aggregate(
        &self,
        relation: &OverlapRelation,
        values: &[Option<f64>],
        denoms: &Denominators<'_>,
    ) -> Vec<Option<f64>>;
}

/// Additive variables: counts, totals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensiveAggregator {
    pub weight: WeightPolicy,
}

impl ExtensiveAggregator {
    pub fn new(weight: WeightPolicy) -> Self {
        Self { weight }
    }
}

impl Aggregator for ExtensiveAggregator {
    fn name(&self) -> &'static str {
        "extensive"
    }

    fn aggregate(
        &self,
        relation: &OverlapRelation,
        values: &[Option<f64>],
        denoms: &Denominators<'_>,
    ) -> Vec<Option<f64>> {
        accumulate(relation, values, |s, _| denoms.source(self.weight, s))
    }
}

/// Densities and rates: area-weighted average over overlapping sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntensiveAggregator;

impl Aggregator for IntensiveAggregator {
    fn name(&self) -> &'static str {
        "intensive"
    }

    fn aggregate(
        &self,
        relation: &OverlapRelation,
        values: &[Option<f64>],
        denoms: &Denominators<'_>,
    ) -> Vec<Option<f64>> {
        accumulate(relation, values, |_, t| denoms.target(t))
    }
}

fn accumulate<D>(relation: &OverlapRelation, values: &[Option<f64>], denom: D) -> Vec<Option<f64>>
where
    D: Fn(usize, usize) -> Option<f64>,
{
    let mut out: Vec<Option<f64>> = vec![None; relation.n_targets()];
    for r in relation.records() {
        let Some(value) = values[r.source] else { continue };
        let Some(d) = denom(r.source, r.target) else { continue };
        let term = value * r.area / d;
        out[r.target] = Some(out[r.target].unwrap_or(0.0) + term);
    }
    out
}

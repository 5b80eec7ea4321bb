//! Normalizing areas that turn overlap areas into weights

use super::overlap::OverlapRelation;
use super::params::WeightPolicy;
use arealis_core::{GeometryBackend, Result};
use geo::Geometry;

/// Per-source and per-target denominators for one overlap relation.
///
/// A denominator that is zero (or not finite) is reported as `None`;
/// every quotient using it is then null instead of an infinity.
#[derive(Debug, Clone)]
pub struct Denominators<'a> {
    source_sum: Vec<f64>,
    source_area: Option<&'a [f64]>,
    target_sum: Vec<f64>,
}

impl<'a> Denominators<'a> {
    /// Derive the overlap sums of `relation`. `source_area` holds the full
    /// area of every source and is only needed for [`WeightPolicy::Total`].
    pub fn from_relation(relation: &OverlapRelation, source_area: Option<&'a [f64]>) -> Self {
        Self {
            source_sum: relation.source_sums(),
            source_area,
            target_sum: relation.target_sums(),
        }
    }

    /// Extensive denominator of source `i`
    pub fn source(&self, policy: WeightPolicy, i: usize) -> Option<f64> {
        match policy {
            WeightPolicy::Sum => nonzero(self.source_sum[i]),
            WeightPolicy::Total => self.source_area.and_then(|areas| nonzero(areas[i])),
        }
    }

    /// Intensive denominator of target `j`
    pub fn target(&self, j: usize) -> Option<f64> {
        nonzero(self.target_sum[j])
    }
}

fn nonzero(d: f64) -> Option<f64> {
    (d != 0.0 && d.is_finite()).then_some(d)
}

/// Full area of every source geometry; missing geometries have area 0
pub fn source_areas<B: GeometryBackend + ?Sized>(
    backend: &B,
    sources: &[Option<&Geometry<f64>>],
) -> Result<Vec<f64>> {
    sources
        .iter()
        .map(|geom| match geom {
            Some(g) => backend.area(g),
            None => Ok(0.0),
        })
        .collect()
}

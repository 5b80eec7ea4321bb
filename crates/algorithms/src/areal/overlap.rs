//! Overlap relation between source and target polygons
//!
//! For every (source, target) pair whose geometries intersect with a
//! positive area, one [`OverlapRecord`] is emitted. Pairs that do not
//! intersect are absent, which keeps the relation sparse.

use super::params::OverlapStrategy;
use crate::maybe_rayon::*;
use arealis_core::{GeometryBackend, Result};
use geo::{Geometry, Rect};
use rstar::{RTree, RTreeObject, AABB};

/// One intersecting pair. `source` and `target` index the prepared layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapRecord {
    pub source: usize,
    pub target: usize,
    pub area: f64,
}

/// Sparse set of overlap records, ordered by (source, target)
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapRelation {
    records: Vec<OverlapRecord>,
    n_sources: usize,
    n_targets: usize,
}

impl OverlapRelation {
    pub fn new(records: Vec<OverlapRecord>, n_sources: usize, n_targets: usize) -> Self {
        Self {
            records,
            n_sources,
            n_targets,
        }
    }

    pub fn records(&self) -> &[OverlapRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn n_sources(&self) -> usize {
        self.n_sources
    }

    pub fn n_targets(&self) -> usize {
        self.n_targets
    }

    /// Copy of the relation without the sources rejected by `keep`
    pub fn retain_sources<F: Fn(usize) -> bool>(&self, keep: F) -> Self {
        Self {
            records: self
                .records
                .iter()
                .filter(|r| keep(r.source))
                .copied()
                .collect(),
            n_sources: self.n_sources,
            n_targets: self.n_targets,
        }
    }

    /// Per-target flag: overlapped by at least one source
    pub fn matched_targets(&self) -> Vec<bool> {
        let mut matched = vec![false; self.n_targets];
        for r in &self.records {
            matched[r.target] = true;
        }
        matched
    }

    /// Σ overlap area per source
    pub fn source_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_sources];
        for r in &self.records {
            sums[r.source] += r.area;
        }
        sums
    }

    /// Σ overlap area per target
    pub fn target_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_targets];
        for r in &self.records {
            sums[r.target] += r.area;
        }
        sums
    }
}

#[derive(Debug, Clone)]
struct TargetEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for TargetEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

fn to_aabb(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// R-tree over target bounding boxes
struct TargetIndex {
    tree: RTree<TargetEnvelope>,
}

impl TargetIndex {
    fn build<B: GeometryBackend + ?Sized>(backend: &B, targets: &[Option<&Geometry<f64>>]) -> Self {
        let envelopes = targets
            .iter()
            .enumerate()
            .filter_map(|(index, geom)| {
                let rect = backend.envelope((*geom)?)?;
                Some(TargetEnvelope {
                    index,
                    aabb: to_aabb(rect),
                })
            })
            .collect();
        Self {
            tree: RTree::bulk_load(envelopes),
        }
    }

    /// Targets whose box intersects `rect`, in input order
    fn candidates(&self, rect: Rect<f64>) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&to_aabb(rect))
            .map(|e| e.index)
            .collect();
        hits.sort_unstable();
        hits
    }
}

/// Compute the overlap relation between two aligned layers.
///
/// `None` entries (features without geometry, or sources filtered out)
/// never overlap anything. The result does not depend on `strategy`.
pub fn compute_overlaps<B: GeometryBackend + ?Sized>(
    backend: &B,
    sources: &[Option<&Geometry<f64>>],
    targets: &[Option<&Geometry<f64>>],
    strategy: OverlapStrategy,
) -> Result<OverlapRelation> {
    let index = match strategy {
        OverlapStrategy::Indexed => Some(TargetIndex::build(backend, targets)),
        OverlapStrategy::Pairwise => None,
    };

    let per_source: Vec<Vec<OverlapRecord>> = (0..sources.len())
        .into_par_iter()
        .map(|i| -> Result<Vec<OverlapRecord>> {
            let Some(src) = sources[i] else {
                return Ok(Vec::new());
            };
            let candidates: Vec<usize> = match &index {
                Some(index) => match backend.envelope(src) {
                    Some(rect) => index.candidates(rect),
                    None => Vec::new(),
                },
                None => (0..targets.len()).collect(),
            };

            let mut out = Vec::new();
            for j in candidates {
                let Some(tgt) = targets[j] else { continue };
                if !backend.intersects(src, tgt)? {
                    continue;
                }
                let area = backend.intersection_area(src, tgt)?;
                if area > 0.0 {
                    out.push(OverlapRecord {
                        source: i,
                        target: j,
                        area,
                    });
                }
            }
            Ok(out)
        })
        .collect::<Result<Vec<_>>>()?;

    let records: Vec<OverlapRecord> = per_source.into_iter().flatten().collect();
    tracing::debug!(
        sources = sources.len(),
        targets = targets.len(),
        records = records.len(),
        ?strategy,
        "overlap relation computed"
    );
    Ok(OverlapRelation::new(records, sources.len(), targets.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use arealis_core::GeoBackend;
    use geo::{Geometry, Polygon, Rect};

    fn square(x0: f64, y0: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(Polygon::from(Rect::new((x0, y0), (x0 + size, y0 + size))))
    }

    fn grid() -> (Vec<Geometry<f64>>, Vec<Geometry<f64>>) {
        // One 10x10 source, four 5x5 targets, one disjoint target
        let sources = vec![square(0.0, 0.0, 10.0), square(20.0, 20.0, 2.0)];
        let targets = vec![
            square(0.0, 0.0, 5.0),
            square(5.0, 0.0, 5.0),
            square(0.0, 5.0, 5.0),
            square(5.0, 5.0, 5.0),
            square(50.0, 50.0, 1.0),
        ];
        (sources, targets)
    }

    #[test]
    fn test_overlap_records() {
        let (s, t) = grid();
        let sources: Vec<_> = s.iter().map(Some).collect();
        let targets: Vec<_> = t.iter().map(Some).collect();
        let rel = compute_overlaps(&GeoBackend, &sources, &targets, OverlapStrategy::Indexed).unwrap();

        assert_eq!(rel.len(), 4);
        for (k, r) in rel.records().iter().enumerate() {
            assert_eq!(r.source, 0);
            assert_eq!(r.target, k);
            assert_relative_eq!(r.area, 25.0, max_relative = 1e-6);
        }
        assert_relative_eq!(rel.source_sums()[0], 100.0, max_relative = 1e-6);
        assert_eq!(rel.source_sums()[1], 0.0);
        assert_eq!(rel.matched_targets(), vec![true, true, true, true, false]);
    }

    #[test]
    fn test_strategies_agree() {
        let (s, t) = grid();
        let sources: Vec<_> = s.iter().map(Some).collect();
        let targets: Vec<_> = t.iter().map(Some).collect();
        let indexed = compute_overlaps(&GeoBackend, &sources, &targets, OverlapStrategy::Indexed).unwrap();
        let pairwise = compute_overlaps(&GeoBackend, &sources, &targets, OverlapStrategy::Pairwise).unwrap();
        assert_eq!(indexed, pairwise);
    }

    #[test]
    fn test_touching_pairs_are_absent() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(1.0, 0.0, 1.0);
        let rel = compute_overlaps(&GeoBackend, &[Some(&a)], &[Some(&b)], OverlapStrategy::Pairwise).unwrap();
        assert!(rel.is_empty());
    }

    #[test]
    fn test_missing_geometries_and_retain() {
        let (s, t) = grid();
        let sources = vec![None, Some(&s[0])];
        let targets: Vec<_> = t.iter().map(Some).collect();
        let rel = compute_overlaps(&GeoBackend, &sources, &targets, OverlapStrategy::Indexed).unwrap();
        assert!(rel.records().iter().all(|r| r.source == 1));
        assert_eq!(rel.len(), 4);

        let none = rel.retain_sources(|i| i != 1);
        assert!(none.is_empty());
        assert_eq!(none.n_targets(), 5);
        assert_eq!(none.target_sums(), vec![0.0; 5]);
    }
}

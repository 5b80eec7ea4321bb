//! Shared fixtures for the interpolation integration tests.

#![allow(dead_code)]

use arealis_core::{
    AttributeValue, Error, Feature, FeatureCollection, GeoBackend, GeometryBackend, Result, CRS,
};
use geo::{Geometry, Polygon, Rect};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Axis-aligned rectangle polygon
pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
    Polygon::from(Rect::new((x0, y0), (x1, y1)))
}

/// Feature with an integer id and numeric attributes
pub fn feature(id: i64, polygon: Polygon<f64>, attrs: &[(&str, Option<f64>)]) -> Feature {
    let mut f = Feature::new(polygon).with_property("id", id);
    for (name, value) in attrs {
        f.set_property(*name, AttributeValue::from(*value));
    }
    f
}

/// Target layer of bare rectangles, ids 1..
pub fn targets(rects: &[Polygon<f64>]) -> FeatureCollection {
    rects
        .iter()
        .enumerate()
        .map(|(i, r)| feature(i as i64 + 1, r.clone(), &[]))
        .collect()
}

/// The 10x10 source with `pop = 200` used by the split scenarios
pub fn unit_source() -> FeatureCollection {
    std::iter::once(feature(1, rect(0.0, 0.0, 10.0, 10.0), &[("pop", Some(200.0))])).collect()
}

/// A `cols x rows` grid of unit-less cells of size `size`, values from `value(col, row)`
pub fn grid<F: Fn(usize, usize) -> f64>(
    cols: usize,
    rows: usize,
    size: f64,
    name: &str,
    value: F,
) -> FeatureCollection {
    let mut fc = FeatureCollection::new();
    for r in 0..rows {
        for c in 0..cols {
            let x0 = c as f64 * size;
            let y0 = r as f64 * size;
            fc.push(feature(
                (r * cols + c) as i64 + 1,
                rect(x0, y0, x0 + size, y0 + size),
                &[(name, Some(value(c, r)))],
            ));
        }
    }
    fc
}

/// Backend that counts every call before delegating to [`GeoBackend`]
#[derive(Debug, Default)]
pub struct CountingBackend {
    inner: GeoBackend,
    calls: AtomicUsize,
}

impl CountingBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl GeometryBackend for CountingBackend {
    fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> Result<bool> {
        self.hit();
        self.inner.intersects(a, b)
    }

    fn intersection_area(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> Result<f64> {
        self.hit();
        self.inner.intersection_area(a, b)
    }

    fn area(&self, geom: &Geometry<f64>) -> Result<f64> {
        self.hit();
        self.inner.area(geom)
    }

    fn reproject(&self, geom: &Geometry<f64>, from: &CRS, to: &CRS) -> Result<Geometry<f64>> {
        self.hit();
        self.inner.reproject(geom, from, to)
    }

    fn envelope(&self, geom: &Geometry<f64>) -> Option<Rect<f64>> {
        self.hit();
        self.inner.envelope(geom)
    }
}

/// Backend whose clipping always fails; everything else delegates to [`GeoBackend`]
#[derive(Debug, Default)]
pub struct FailingBackend {
    inner: GeoBackend,
}

impl GeometryBackend for FailingBackend {
    fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> Result<bool> {
        self.inner.intersects(a, b)
    }

    fn intersection_area(&self, _a: &Geometry<f64>, _b: &Geometry<f64>) -> Result<f64> {
        Err(Error::GeometryBackend("clipping unavailable".into()))
    }

    fn area(&self, geom: &Geometry<f64>) -> Result<f64> {
        self.inner.area(geom)
    }

    fn reproject(&self, geom: &Geometry<f64>, from: &CRS, to: &CRS) -> Result<Geometry<f64>> {
        self.inner.reproject(geom, from, to)
    }
}

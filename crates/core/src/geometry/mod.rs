//! Geometry backend
//!
//! The narrow set of geometric predicates and measures the interpolation
//! engine consumes. [`GeoBackend`] implements it on top of the `geo`
//! crate; tests and alternative engines can supply their own.

use crate::crs::{Projector, CRS};
use crate::error::{Error, Result};
use crate::io::wkb;
use geo::{Area, BooleanOps, BoundingRect, Coord, Intersects, MapCoords};
use geo_types::{Geometry, MultiPolygon, Polygon, Rect};
use std::any::Any;
use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Geometric operations consumed by the interpolation engine.
///
/// Implementations must be shareable across worker threads; the overlap
/// computation calls them concurrently when the `parallel` feature of the
/// algorithms crate is enabled.
pub trait GeometryBackend: Sync {
    /// Whether the two geometries share at least one point
    fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> Result<bool>;

    /// Area of `a ∩ b`; 0 when disjoint or when the intersection has no area
    fn intersection_area(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> Result<f64>;

    /// Unsigned area of a geometry; 0 for points and lines
    fn area(&self, geom: &Geometry<f64>) -> Result<f64>;

    /// Transform a geometry between two coordinate reference systems
    fn reproject(&self, geom: &Geometry<f64>, from: &CRS, to: &CRS) -> Result<Geometry<f64>>;

    /// Axis-aligned envelope, used to build spatial indexes
    fn envelope(&self, geom: &Geometry<f64>) -> Option<Rect<f64>> {
        geom.bounding_rect()
    }

    /// Serialize to well-known binary
    fn encode(&self, geom: &Geometry<f64>) -> Result<Vec<u8>> {
        wkb::encode(geom)
    }

    /// Parse well-known binary
    fn decode(&self, bytes: &[u8]) -> Result<Geometry<f64>> {
        wkb::decode(bytes)
    }
}

/// Planar geometry backend built on the `geo` crate.
///
/// Areas are Cartesian, in squared CRS units. Invalid polygons
/// (self-intersections, unclosed rings) are not repaired; the resulting
/// areas are whatever the boolean operations produce, and a panic inside
/// the clipping code surfaces as [`Error::GeometryBackend`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoBackend;

impl GeoBackend {
    pub fn new() -> Self {
        Self
    }
}

impl GeometryBackend for GeoBackend {
    fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> Result<bool> {
        guarded(|| a.intersects(b))
    }

    fn intersection_area(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> Result<f64> {
        let (Some(pa), Some(pb)) = (polygonal(a), polygonal(b)) else {
            return Ok(0.0);
        };

        match (pa.bounding_rect(), pb.bounding_rect()) {
            (Some(ra), Some(rb)) if ra.intersects(&rb) => {}
            _ => return Ok(0.0),
        }

        let clipped = guarded(|| pa.as_ref().intersection(pb.as_ref()))?;
        Ok(clipped.unsigned_area())
    }

    fn area(&self, geom: &Geometry<f64>) -> Result<f64> {
        Ok(polygonal(geom).map_or(0.0, |mp| mp.unsigned_area()))
    }

    fn reproject(&self, geom: &Geometry<f64>, from: &CRS, to: &CRS) -> Result<Geometry<f64>> {
        let projector = Projector::new(from, to)?;
        if projector.is_identity() {
            return Ok(geom.clone());
        }
        Ok(geom.map_coords(move |c| {
            let (x, y) = projector.transform(c.x, c.y);
            Coord { x, y }
        }))
    }
}

/// View a geometry as a multipolygon, if it has area semantics.
///
/// Geometry collections contribute their polygonal members; points and
/// lines yield `None`.
pub fn polygonal(geom: &Geometry<f64>) -> Option<Cow<'_, MultiPolygon<f64>>> {
    match geom {
        Geometry::MultiPolygon(mp) => Some(Cow::Borrowed(mp)),
        Geometry::Polygon(p) => Some(Cow::Owned(MultiPolygon::new(vec![p.clone()]))),
        Geometry::Rect(r) => Some(Cow::Owned(MultiPolygon::new(vec![r.to_polygon()]))),
        Geometry::Triangle(t) => Some(Cow::Owned(MultiPolygon::new(vec![t.to_polygon()]))),
        Geometry::GeometryCollection(gc) => {
            let polys: Vec<Polygon<f64>> = gc
                .iter()
                .filter_map(polygonal)
                .flat_map(|mp| mp.into_owned().0)
                .collect();
            if polys.is_empty() {
                None
            } else {
                Some(Cow::Owned(MultiPolygon::new(polys)))
            }
        }
        _ => None,
    }
}

/// Run a geometry operation, turning a panic into a backend error.
fn guarded<T>(op: impl FnOnce() -> T) -> Result<T> {
    catch_unwind(AssertUnwindSafe(op)).map_err(|payload| Error::GeometryBackend(panic_message(payload)))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "geometry operation panicked".to_string()
    }
}

//! GeoJSON reading and writing for feature collections.
//!
//! Handles the RFC 7946 geometry types plus the legacy `crs` member
//! (`{"type": "name", "properties": {"name": "EPSG:32633"}}`), which is how
//! layers carry CRS metadata through this format.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use serde_json::{json, Map, Number, Value};
use std::fs;
use std::path::Path;

/// Read a GeoJSON file into a feature collection
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let text = fs::read_to_string(path.as_ref())?;
    read_geojson_from_str(&text)
}

/// Parse a GeoJSON `FeatureCollection` or single `Feature`
pub fn read_geojson_from_str(text: &str) -> Result<FeatureCollection> {
    let value: Value = serde_json::from_str(text)?;
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Codec("GeoJSON root must be an object".into()))?;

    let mut collection = match member_str(obj, "type")? {
        "FeatureCollection" => {
            let features = obj
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::Codec("FeatureCollection without features array".into()))?;
            features.iter().map(parse_feature).collect::<Result<FeatureCollection>>()?
        }
        "Feature" => std::iter::once(parse_feature(&value)).collect::<Result<FeatureCollection>>()?,
        other => {
            return Err(Error::Codec(format!(
                "expected Feature or FeatureCollection, found {other}"
            )))
        }
    };

    collection.crs = obj
        .get("crs")
        .and_then(|c| c.get("properties"))
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .map(CRS::parse);

    Ok(collection)
}

/// Write a feature collection to a GeoJSON file
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let text = serde_json::to_string_pretty(&to_geojson_value(collection))?;
    fs::write(path.as_ref(), text)?;
    Ok(())
}

/// Serialize a feature collection to a GeoJSON string
pub fn to_geojson_string(collection: &FeatureCollection) -> Result<String> {
    Ok(serde_json::to_string(&to_geojson_value(collection))?)
}

/// Build the GeoJSON object for a feature collection
pub fn to_geojson_value(collection: &FeatureCollection) -> Value {
    let features: Vec<Value> = collection.iter().map(feature_value).collect();
    let mut root = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    if let (Some(crs), Some(obj)) = (&collection.crs, root.as_object_mut()) {
        obj.insert(
            "crs".into(),
            json!({"type": "name", "properties": {"name": crs.identifier()}}),
        );
    }
    root
}

// ── Parsing ──────────────────────────────────────────────────────────────

fn member_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Codec(format!("missing string member \"{key}\"")))
}

fn parse_feature(value: &Value) -> Result<Feature> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Codec("feature must be an object".into()))?;

    let geometry = match obj.get("geometry") {
        None | Some(Value::Null) => None,
        Some(g) => Some(parse_geometry(g)?),
    };

    let mut feature = match geometry {
        Some(g) => Feature::new(g),
        None => Feature::empty(),
    };

    feature.id = match obj.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    if let Some(props) = obj.get("properties").and_then(Value::as_object) {
        for (key, v) in props {
            feature.set_property(key.clone(), attribute_from_json(v));
        }
    }

    Ok(feature)
}

fn attribute_from_json(v: &Value) -> AttributeValue {
    match v {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => n.as_f64().map_or(AttributeValue::Null, AttributeValue::Float),
        },
        Value::String(s) => AttributeValue::String(s.clone()),
        nested => AttributeValue::String(nested.to_string()),
    }
}

fn coords_of<'a>(obj: &'a Map<String, Value>) -> Result<&'a Value> {
    obj.get("coordinates")
        .ok_or_else(|| Error::Codec("geometry without coordinates".into()))
}

fn parse_geometry(value: &Value) -> Result<Geometry<f64>> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Codec("geometry must be an object".into()))?;

    let geom = match member_str(obj, "type")? {
        "Point" => Geometry::Point(Point(parse_position(coords_of(obj)?)?)),
        "LineString" => Geometry::LineString(parse_line(coords_of(obj)?)?),
        "Polygon" => Geometry::Polygon(parse_polygon(coords_of(obj)?)?),
        "MultiPoint" => Geometry::MultiPoint(MultiPoint::new(
            array(coords_of(obj)?)?
                .iter()
                .map(|p| parse_position(p).map(Point))
                .collect::<Result<_>>()?,
        )),
        "MultiLineString" => Geometry::MultiLineString(MultiLineString::new(
            array(coords_of(obj)?)?
                .iter()
                .map(parse_line)
                .collect::<Result<_>>()?,
        )),
        "MultiPolygon" => Geometry::MultiPolygon(MultiPolygon::new(
            array(coords_of(obj)?)?
                .iter()
                .map(parse_polygon)
                .collect::<Result<_>>()?,
        )),
        "GeometryCollection" => {
            let members = obj
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::Codec("GeometryCollection without geometries".into()))?;
            Geometry::GeometryCollection(GeometryCollection::new_from(
                members.iter().map(parse_geometry).collect::<Result<_>>()?,
            ))
        }
        other => return Err(Error::Codec(format!("unknown geometry type {other}"))),
    };
    Ok(geom)
}

fn array(value: &Value) -> Result<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::Codec("expected coordinate array".into()))
}

fn parse_position(value: &Value) -> Result<Coord<f64>> {
    let pos = array(value)?;
    let ordinate = |i: usize| {
        pos.get(i)
            .and_then(Value::as_f64)
            .ok_or_else(|| Error::Codec(format!("position needs numeric ordinate {i}")))
    };
    Ok(Coord {
        x: ordinate(0)?,
        y: ordinate(1)?,
    })
}

fn parse_line(value: &Value) -> Result<LineString<f64>> {
    Ok(LineString::new(
        array(value)?
            .iter()
            .map(parse_position)
            .collect::<Result<_>>()?,
    ))
}

fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let mut rings = array(value)?.iter().map(parse_line);
    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => LineString::new(vec![]),
    };
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

// ── Writing ──────────────────────────────────────────────────────────────

fn feature_value(feature: &Feature) -> Value {
    let properties: Map<String, Value> = feature
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), attribute_to_json(v)))
        .collect();

    let mut obj = Map::new();
    obj.insert("type".into(), Value::String("Feature".into()));
    if let Some(id) = &feature.id {
        obj.insert("id".into(), Value::String(id.clone()));
    }
    obj.insert(
        "geometry".into(),
        feature.geometry.as_ref().map_or(Value::Null, geometry_value),
    );
    obj.insert("properties".into(), Value::Object(properties));
    Value::Object(obj)
}

fn attribute_to_json(v: &AttributeValue) -> Value {
    match v {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Int(i) => Value::Number((*i).into()),
        // JSON has no NaN/Inf
        AttributeValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        AttributeValue::String(s) => Value::String(s.clone()),
    }
}

fn position(c: &Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn line(ls: &LineString<f64>) -> Value {
    Value::Array(ls.0.iter().map(position).collect())
}

fn polygon_coords(p: &Polygon<f64>) -> Value {
    if p.exterior().0.is_empty() {
        return Value::Array(vec![]);
    }
    let mut rings = vec![line(p.exterior())];
    rings.extend(p.interiors().iter().map(line));
    Value::Array(rings)
}

fn geometry_value(geom: &Geometry<f64>) -> Value {
    match geom {
        Geometry::Point(p) => json!({"type": "Point", "coordinates": position(&p.0)}),
        Geometry::Line(l) => json!({
            "type": "LineString",
            "coordinates": [position(&l.start), position(&l.end)],
        }),
        Geometry::LineString(ls) => json!({"type": "LineString", "coordinates": line(ls)}),
        Geometry::Polygon(p) => json!({"type": "Polygon", "coordinates": polygon_coords(p)}),
        Geometry::Rect(r) => json!({"type": "Polygon", "coordinates": polygon_coords(&r.to_polygon())}),
        Geometry::Triangle(t) => {
            json!({"type": "Polygon", "coordinates": polygon_coords(&t.to_polygon())})
        }
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.0.iter().map(|p| position(&p.0)).collect::<Vec<_>>(),
        }),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.0.iter().map(line).collect::<Vec<_>>(),
        }),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon_coords).collect::<Vec<_>>(),
        }),
        Geometry::GeometryCollection(gc) => json!({
            "type": "GeometryCollection",
            "geometries": gc.0.iter().map(geometry_value).collect::<Vec<_>>(),
        }),
    }
}

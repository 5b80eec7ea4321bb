//! Well-known binary (WKB) encoding of 2D geometries.
//!
//! Reads both byte orders, writes little-endian (NDR). Only XY
//! geometries are supported; Z/M and EWKB SRID flags are rejected.

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};

use crate::error::{Error, Result};

/// WKB geometry type codes (OGC SFA, 2D).
mod codes {
    pub const POINT: u32 = 1;
    pub const LINE_STRING: u32 = 2;
    pub const POLYGON: u32 = 3;
    pub const MULTI_POINT: u32 = 4;
    pub const MULTI_LINE_STRING: u32 = 5;
    pub const MULTI_POLYGON: u32 = 6;
    pub const GEOMETRY_COLLECTION: u32 = 7;
}

const NDR: u8 = 1;
const XDR: u8 = 0;
const MAX_DEPTH: usize = 32;

/// Encode a geometry as little-endian WKB
pub fn encode(geom: &Geometry<f64>) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(64);
    write_geometry(&mut buf, geom)?;
    Ok(buf)
}

/// Decode a WKB buffer; trailing bytes are an error
pub fn decode(bytes: &[u8]) -> Result<Geometry<f64>> {
    let mut reader = WkbReader { buf: bytes, pos: 0, little: true };
    let geom = reader.geometry(0)?;
    if reader.pos != bytes.len() {
        return Err(Error::Codec(format!(
            "{} trailing bytes after geometry",
            bytes.len() - reader.pos
        )));
    }
    Ok(geom)
}

// ── Writing ──────────────────────────────────────────────────────────────

fn write_header(buf: &mut Vec<u8>, code: u32) -> Result<()> {
    buf.write_u8(NDR)?;
    buf.write_u32::<LittleEndian>(code)?;
    Ok(())
}

fn write_coord(buf: &mut Vec<u8>, c: Coord<f64>) -> Result<()> {
    buf.write_f64::<LittleEndian>(c.x)?;
    buf.write_f64::<LittleEndian>(c.y)?;
    Ok(())
}

fn write_count(buf: &mut Vec<u8>, n: usize) -> Result<()> {
    let n = u32::try_from(n).map_err(|_| Error::Codec(format!("element count {n} exceeds u32")))?;
    buf.write_u32::<LittleEndian>(n)?;
    Ok(())
}

fn write_ring(buf: &mut Vec<u8>, ring: &LineString<f64>) -> Result<()> {
    write_count(buf, ring.0.len())?;
    for c in &ring.0 {
        write_coord(buf, *c)?;
    }
    Ok(())
}

fn write_polygon_body(buf: &mut Vec<u8>, poly: &Polygon<f64>) -> Result<()> {
    if poly.exterior().0.is_empty() {
        return write_count(buf, 0);
    }
    write_count(buf, 1 + poly.interiors().len())?;
    write_ring(buf, poly.exterior())?;
    for ring in poly.interiors() {
        write_ring(buf, ring)?;
    }
    Ok(())
}

fn write_geometry(buf: &mut Vec<u8>, geom: &Geometry<f64>) -> Result<()> {
    match geom {
        Geometry::Point(p) => {
            write_header(buf, codes::POINT)?;
            write_coord(buf, p.0)
        }
        Geometry::Line(l) => {
            write_header(buf, codes::LINE_STRING)?;
            write_ring(buf, &LineString::new(vec![l.start, l.end]))
        }
        Geometry::LineString(ls) => {
            write_header(buf, codes::LINE_STRING)?;
            write_ring(buf, ls)
        }
        Geometry::Polygon(p) => {
            write_header(buf, codes::POLYGON)?;
            write_polygon_body(buf, p)
        }
        Geometry::Rect(r) => {
            write_header(buf, codes::POLYGON)?;
            write_polygon_body(buf, &r.to_polygon())
        }
        Geometry::Triangle(t) => {
            write_header(buf, codes::POLYGON)?;
            write_polygon_body(buf, &t.to_polygon())
        }
        Geometry::MultiPoint(mp) => {
            write_header(buf, codes::MULTI_POINT)?;
            write_count(buf, mp.0.len())?;
            for p in &mp.0 {
                write_geometry(buf, &Geometry::Point(*p))?;
            }
            Ok(())
        }
        Geometry::MultiLineString(mls) => {
            write_header(buf, codes::MULTI_LINE_STRING)?;
            write_count(buf, mls.0.len())?;
            for ls in &mls.0 {
                write_header(buf, codes::LINE_STRING)?;
                write_ring(buf, ls)?;
            }
            Ok(())
        }
        Geometry::MultiPolygon(mp) => {
            write_header(buf, codes::MULTI_POLYGON)?;
            write_count(buf, mp.0.len())?;
            for p in &mp.0 {
                write_header(buf, codes::POLYGON)?;
                write_polygon_body(buf, p)?;
            }
            Ok(())
        }
        Geometry::GeometryCollection(gc) => {
            write_header(buf, codes::GEOMETRY_COLLECTION)?;
            write_count(buf, gc.0.len())?;
            for g in &gc.0 {
                write_geometry(buf, g)?;
            }
            Ok(())
        }
    }
}

// ── Reading ──────────────────────────────────────────────────────────────

struct WkbReader<'a> {
    buf: &'a [u8],
    pos: usize,
    little: bool,
}

impl<'a> WkbReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::Codec(format!("unexpected end of WKB at byte {}", self.pos)))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(if self.little {
            LittleEndian::read_u32(b)
        } else {
            BigEndian::read_u32(b)
        })
    }

    fn f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        Ok(if self.little {
            LittleEndian::read_f64(b)
        } else {
            BigEndian::read_f64(b)
        })
    }

    /// Read an element count, rejecting counts the remaining bytes cannot hold
    fn count(&mut self, min_element_size: usize) -> Result<usize> {
        let n = self.u32()? as usize;
        let remaining = self.buf.len() - self.pos;
        if n.saturating_mul(min_element_size) > remaining {
            return Err(Error::Codec(format!(
                "count {n} exceeds remaining {remaining} bytes"
            )));
        }
        Ok(n)
    }

    fn coord(&mut self) -> Result<Coord<f64>> {
        let x = self.f64()?;
        let y = self.f64()?;
        Ok(Coord { x, y })
    }

    fn ring(&mut self) -> Result<LineString<f64>> {
        let n = self.count(16)?;
        let coords = (0..n).map(|_| self.coord()).collect::<Result<Vec<_>>>()?;
        Ok(LineString::new(coords))
    }

    fn polygon_body(&mut self) -> Result<Polygon<f64>> {
        let n = self.count(4)?;
        if n == 0 {
            return Ok(Polygon::new(LineString::new(vec![]), vec![]));
        }
        let exterior = self.ring()?;
        let interiors = (1..n).map(|_| self.ring()).collect::<Result<Vec<_>>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    fn header(&mut self) -> Result<u32> {
        self.little = match self.u8()? {
            NDR => true,
            XDR => false,
            other => return Err(Error::Codec(format!("invalid byte order marker {other}"))),
        };
        let code = self.u32()?;
        if code > codes::GEOMETRY_COLLECTION {
            return Err(Error::Codec(format!(
                "unsupported WKB geometry type {code:#x} (only 2D OGC types)"
            )));
        }
        Ok(code)
    }

    /// Read a nested member and require the expected type
    fn member(&mut self, expected: u32, depth: usize) -> Result<Geometry<f64>> {
        let start = self.pos;
        let geom = self.geometry(depth + 1)?;
        let code = match &geom {
            Geometry::Point(_) => codes::POINT,
            Geometry::LineString(_) => codes::LINE_STRING,
            Geometry::Polygon(_) => codes::POLYGON,
            _ => 0,
        };
        if code != expected {
            return Err(Error::Codec(format!(
                "multi-geometry member at byte {start} has type {code}, expected {expected}"
            )));
        }
        Ok(geom)
    }

    fn geometry(&mut self, depth: usize) -> Result<Geometry<f64>> {
        if depth > MAX_DEPTH {
            return Err(Error::Codec("geometry collections nested too deeply".into()));
        }
        let code = self.header()?;
        let geom = match code {
            codes::POINT => Geometry::Point(Point(self.coord()?)),
            codes::LINE_STRING => Geometry::LineString(self.ring()?),
            codes::POLYGON => Geometry::Polygon(self.polygon_body()?),
            codes::MULTI_POINT => {
                let n = self.count(21)?;
                let mut points = Vec::with_capacity(n);
                for _ in 0..n {
                    if let Geometry::Point(p) = self.member(codes::POINT, depth)? {
                        points.push(p);
                    }
                }
                Geometry::MultiPoint(MultiPoint::new(points))
            }
            codes::MULTI_LINE_STRING => {
                let n = self.count(9)?;
                let mut lines = Vec::with_capacity(n);
                for _ in 0..n {
                    if let Geometry::LineString(ls) = self.member(codes::LINE_STRING, depth)? {
                        lines.push(ls);
                    }
                }
                Geometry::MultiLineString(MultiLineString::new(lines))
            }
            codes::MULTI_POLYGON => {
                let n = self.count(9)?;
                let mut polys = Vec::with_capacity(n);
                for _ in 0..n {
                    if let Geometry::Polygon(p) = self.member(codes::POLYGON, depth)? {
                        polys.push(p);
                    }
                }
                Geometry::MultiPolygon(MultiPolygon::new(polys))
            }
            codes::GEOMETRY_COLLECTION => {
                let n = self.count(5)?;
                let members = (0..n)
                    .map(|_| self.geometry(depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                Geometry::GeometryCollection(GeometryCollection::new_from(members))
            }
            other => {
                return Err(Error::Codec(format!("unsupported WKB geometry type {other}")));
            }
        };
        Ok(geom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, polygon};

    fn square() -> Polygon<f64> {
        polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0), (x: 0.0, y: 0.0)]
    }

    #[test]
    fn point_layout_is_ndr() {
        let bytes = encode(&Geometry::Point(point!(x: 1.0, y: 2.0))).unwrap();
        assert_eq!(bytes.len(), 21);
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..5], &[1, 0, 0, 0]);
        assert_eq!(LittleEndian::read_f64(&bytes[5..13]), 1.0);
        assert_eq!(LittleEndian::read_f64(&bytes[13..21]), 2.0);
    }

    #[test]
    fn reads_big_endian_point() {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&3.5f64.to_be_bytes());
        bytes.extend_from_slice(&(-1.0f64).to_be_bytes());
        assert_eq!(decode(&bytes).unwrap(), Geometry::Point(point!(x: 3.5, y: -1.0)));
    }

    #[test]
    fn multipolygon_with_hole() {
        let holed = Polygon::new(
            LineString::from(vec![(10.0, 10.0), (20.0, 10.0), (20.0, 20.0), (10.0, 20.0), (10.0, 10.0)]),
            vec![LineString::from(vec![(12.0, 12.0), (14.0, 12.0), (14.0, 14.0), (12.0, 12.0)])],
        );
        let mp = Geometry::MultiPolygon(MultiPolygon::new(vec![square(), holed]));
        assert_eq!(decode(&encode(&mp).unwrap()).unwrap(), mp);
    }

    #[test]
    fn collection_nests() {
        let gc = Geometry::GeometryCollection(GeometryCollection::new_from(vec![
            Geometry::Polygon(square()),
            Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]),
        ]));
        assert_eq!(decode(&encode(&gc).unwrap()).unwrap(), gc);
    }

    #[test]
    fn rect_is_written_as_polygon() {
        let rect = geo_types::Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 2.0, y: 3.0 });
        let decoded = decode(&encode(&Geometry::Rect(rect)).unwrap()).unwrap();
        assert_eq!(decoded, Geometry::Polygon(rect.to_polygon()));
    }

    #[test]
    fn rejects_truncated_and_trailing() {
        let bytes = encode(&Geometry::Polygon(square())).unwrap();
        assert!(matches!(decode(&bytes[..bytes.len() - 3]), Err(Error::Codec(_))));

        let mut extra = bytes.clone();
        extra.push(0);
        assert!(matches!(decode(&extra), Err(Error::Codec(_))));
    }

    #[test]
    fn rejects_z_and_huge_counts() {
        let mut z = vec![1u8];
        z.extend_from_slice(&1001u32.to_le_bytes());
        z.extend_from_slice(&[0u8; 24]);
        assert!(decode(&z).is_err());

        let mut huge = vec![1u8];
        huge.extend_from_slice(&2u32.to_le_bytes());
        huge.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(decode(&huge), Err(Error::Codec(_))));
    }
}

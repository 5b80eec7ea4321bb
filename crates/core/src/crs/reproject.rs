//! Pure-Rust reprojection between WGS84, UTM and Web Mercator.
//!
//! Covers EPSG:4326, EPSG:3857, EPSG 326xx (UTM North) and 327xx
//! (UTM South) with Snyder (1987) series. Projected-to-projected
//! transforms go through WGS84. No libproj, so it builds everywhere.

use super::CRS;
use crate::error::{Error, Result};

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Supported coordinate systems, by their role in the transform chain
#[derive(Debug, Clone, Copy, PartialEq)]
enum Frame {
    Wgs84,
    WebMercator,
    Utm { zone: u32, north: bool },
}

impl Frame {
    fn from_crs(crs: &CRS) -> Option<Self> {
        let epsg = crs.epsg()?;
        match epsg {
            4326 => Some(Frame::Wgs84),
            3857 | 900913 => Some(Frame::WebMercator),
            _ => parse_utm_epsg(epsg).map(|(zone, north)| Frame::Utm { zone, north }),
        }
    }

    fn to_wgs84(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Frame::Wgs84 => (x, y),
            Frame::WebMercator => web_mercator_to_wgs84(x, y),
            Frame::Utm { zone, north } => utm_to_wgs84(x, y, zone, north),
        }
    }

    fn from_wgs84(self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Frame::Wgs84 => (lon, lat),
            Frame::WebMercator => wgs84_to_web_mercator(lon, lat),
            Frame::Utm { zone, north } => wgs84_to_utm(lon, lat, zone, north),
        }
    }
}

/// A coordinate transform between two supported CRSs.
#[derive(Debug, Clone, Copy)]
pub struct Projector {
    from: Frame,
    to: Frame,
}

impl Projector {
    /// Build a projector, failing for CRSs outside the supported set.
    pub fn new(from: &CRS, to: &CRS) -> Result<Self> {
        let unsupported = || Error::UnsupportedReprojection {
            from: from.to_string(),
            to: to.to_string(),
        };
        if from.is_equivalent(to) {
            // Identity works for any CRS, known or not
            return Ok(Self { from: Frame::Wgs84, to: Frame::Wgs84 });
        }
        let from_frame = Frame::from_crs(from).ok_or_else(unsupported)?;
        let to_frame = Frame::from_crs(to).ok_or_else(unsupported)?;
        Ok(Self { from: from_frame, to: to_frame })
    }

    /// True when the transform leaves coordinates untouched
    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    /// Transform a single coordinate pair
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        if self.is_identity() {
            return (x, y);
        }
        let (lon, lat) = self.from.to_wgs84(x, y);
        self.to.from_wgs84(lon, lat)
    }
}

/// Parse an EPSG code into UTM zone info: `Some((zone, is_north))`.
///
/// - EPSG 326xx → zone xx, North hemisphere
/// - EPSG 327xx → zone xx, South hemisphere
fn parse_utm_epsg(epsg: u32) -> Option<(u32, bool)> {
    if (32601..=32660).contains(&epsg) {
        Some((epsg - 32600, true))
    } else if (32701..=32760).contains(&epsg) {
        Some((epsg - 32700, false))
    } else {
        None
    }
}

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

// ── Transverse Mercator (Snyder 1987, USGS Prof. Paper 1395, pp. 61-64) ──

/// WGS84 (longitude, latitude) degrees → UTM (easting, northing) metres.
fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = central_meridian(zone);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a_coeff = cos_lat * (lon - lon0);
    let m = meridional_arc(lat);

    let a2 = a_coeff * a_coeff;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9
    let easting = K0
        * n
        * (a_coeff
            + (1.0 - t + c) * a2 * a_coeff / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a_coeff / 120.0)
        + FALSE_EASTING;

    // Snyder eq. 8-10
    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    let northing = if north {
        northing
    } else {
        northing + FALSE_NORTHING_SOUTH
    };

    (easting, northing)
}

/// UTM (easting, northing) metres → WGS84 (longitude, latitude) degrees.
/// Snyder eqs. 8-12 to 8-18 via the footpoint latitude.
fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let e4 = E2 * E2;
    let e6 = e4 * E2;
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    let sqrt_1me2 = (1.0 - E2).sqrt();
    let e1 = (1.0 - sqrt_1me2) / (1.0 + sqrt_1me2);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin1 = phi1.sin();
    let cos1 = phi1.cos();
    let tan1 = phi1.tan();
    let c1 = E_PRIME2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let denom = 1.0 - E2 * sin1 * sin1;
    let n1 = A / denom.sqrt();
    let r1 = A * (1.0 - E2) / denom.powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d3 * d;
    let d5 = d4 * d;
    let d6 = d5 * d;

    let lat = phi1
        - (n1 * tan1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * E_PRIME2 - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1) * d5
                / 120.0)
            / cos1;

    (lon.to_degrees(), lat.to_degrees())
}

/// Meridional arc from equator to latitude `lat` (radians).
/// Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e2 = E2;
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    A * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

// ── Spherical (Web) Mercator ─────────────────────────────────────────────

fn wgs84_to_web_mercator(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let lat = lat_deg.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
    let x = A * lon_deg.to_radians();
    let y = A * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();
    (x, y)
}

fn web_mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / A).to_degrees();
    let lat = (2.0 * (y / A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(
            diff < tol,
            "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}"
        );
    }

    #[test]
    fn parse_utm_codes() {
        assert_eq!(parse_utm_epsg(32630), Some((30, true)));
        assert_eq!(parse_utm_epsg(32760), Some((60, false)));
        assert_eq!(parse_utm_epsg(32600), None);
        assert_eq!(parse_utm_epsg(32661), None);
        assert_eq!(parse_utm_epsg(4326), None);
    }

    // Reference values from pyproj (PROJ 9.x):
    //   Transformer.from_crs(4326, 32630, always_xy=True).transform(-3.7037, 40.4168)
    //   → (440298.94, 4474257.31)
    #[test]
    fn madrid_wgs84_to_utm30n() {
        let p = Projector::new(&CRS::wgs84(), &CRS::from_epsg(32630)).unwrap();
        let (e, n) = p.transform(-3.7037, 40.4168);
        assert_close(e, 440_298.94, 1.0, "easting");
        assert_close(n, 4_474_257.31, 1.0, "northing");
    }

    // Buenos Aires → UTM 21S: (373317.50, 6170036.17)
    #[test]
    fn buenos_aires_wgs84_to_utm21s() {
        let (e, n) = wgs84_to_utm(-58.3816, -34.6037, 21, false);
        assert_close(e, 373_317.50, 1.0, "easting");
        assert_close(n, 6_170_036.17, 1.0, "northing");
    }

    #[test]
    fn utm_inverse_round_trip() {
        for &(lon, lat, zone, north) in &[
            (-3.7037, 40.4168, 30, true),
            (-58.3816, -34.6037, 21, false),
            (15.0, 0.0, 33, true),
            (16.9, 60.2, 33, true),
        ] {
            let (e, n) = wgs84_to_utm(lon, lat, zone, north);
            let (lon2, lat2) = utm_to_wgs84(e, n, zone, north);
            assert_close(lon2, lon, 1e-6, "longitude");
            assert_close(lat2, lat, 1e-6, "latitude");
        }
    }

    #[test]
    fn web_mercator_known_point() {
        let (x, y) = wgs84_to_web_mercator(180.0, 0.0);
        assert_close(x, 20_037_508.342_789_244, 1e-6, "x at antimeridian");
        assert_close(y, 0.0, 1e-6, "y at equator");
        let (lon, lat) = web_mercator_to_wgs84(x, 0.0);
        assert_close(lon, 180.0, 1e-9, "lon");
        assert_close(lat, 0.0, 1e-9, "lat");
    }

    #[test]
    fn utm_to_web_mercator_via_wgs84() {
        let p = Projector::new(&CRS::from_epsg(32630), &CRS::web_mercator()).unwrap();
        let (e, n) = wgs84_to_utm(-3.7037, 40.4168, 30, true);
        let (x, y) = p.transform(e, n);
        let (lon, lat) = web_mercator_to_wgs84(x, y);
        assert_close(lon, -3.7037, 1e-6, "lon");
        assert_close(lat, 40.4168, 1e-6, "lat");
    }

    #[test]
    fn identity_for_equal_unknown_crs() {
        let wkt = CRS::from_wkt("LOCAL_CS[\"plant grid\"]");
        let p = Projector::new(&wkt, &wkt.clone()).unwrap();
        assert!(p.is_identity());
        assert_eq!(p.transform(1.5, -2.5), (1.5, -2.5));
    }

    #[test]
    fn unsupported_pair_is_rejected() {
        let err = Projector::new(&CRS::from_epsg(2154), &CRS::wgs84()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedReprojection { .. }));
    }
}

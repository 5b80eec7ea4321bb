//! Coordinate Reference System handling

mod reproject;

pub use reproject::Projector;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
///
/// Serialized as its identifier string (`"EPSG:32633"`, a PROJ string or
/// WKT text), so parameter files can name a CRS directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// Parse a user-supplied CRS reference.
    ///
    /// Accepts `EPSG:n`, a bare EPSG number, OGC URNs
    /// (`urn:ogc:def:crs:EPSG::n`), `+proj=...` strings and falls back
    /// to treating anything else as WKT. OGC CRS84 maps to EPSG:4326.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Some(code) = parse_epsg_reference(s) {
            return Self::from_epsg(code);
        }
        if s.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84") || s.eq_ignore_ascii_case("CRS84") {
            return Self::wgs84();
        }
        if s.starts_with("+proj") {
            return Self::from_proj(s);
        }
        Self::from_wkt(s)
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// WGS84 / UTM zone `zone`, north or south hemisphere
    pub fn utm(zone: u32, north: bool) -> Result<Self> {
        if !(1..=60).contains(&zone) {
            return Err(Error::InvalidParameter {
                name: "zone",
                value: zone.to_string(),
                reason: "UTM zones run from 1 to 60".into(),
            });
        }
        let base = if north { 32600 } else { 32700 };
        Ok(Self::from_epsg(base + zone))
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// True for CRSs whose coordinates are angular (areas in square degrees).
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, Some(4326) | Some(4269) | Some(4258) | Some(4674))
            || self.proj.as_deref().is_some_and(|p| p.contains("+proj=longlat"))
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Textual comparison only; two spellings of one CRS do not match.
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            return wkt.clone();
        }
        "Unknown".to_string()
    }
}

/// Check that two layers' CRS metadata agree.
///
/// Both missing is accepted (planar coordinates, caller-defined units).
/// One missing, or two non-equivalent CRSs, is an error.
pub fn ensure_same_crs(target: Option<&CRS>, source: Option<&CRS>) -> Result<()> {
    match (target, source) {
        (None, None) => Ok(()),
        (Some(_), None) => Err(Error::MissingCrs { side: "source" }),
        (None, Some(_)) => Err(Error::MissingCrs { side: "target" }),
        (Some(t), Some(s)) if t.is_equivalent(s) => Ok(()),
        (Some(t), Some(s)) => Err(Error::CrsMismatch(t.identifier(), s.identifier())),
    }
}

fn parse_epsg_reference(s: &str) -> Option<u32> {
    if let Ok(code) = s.parse::<u32>() {
        return Some(code);
    }
    let upper = s.to_ascii_uppercase();
    if let Some(rest) = upper.strip_prefix("EPSG:") {
        return rest.trim().parse().ok();
    }
    if let Some(rest) = upper.strip_prefix("URN:OGC:DEF:CRS:EPSG:") {
        // Optional version between the double colon: "EPSG::32633" or "EPSG:9.8.1:32633"
        return rest.rsplit(':').next()?.parse().ok();
    }
    None
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.identifier();
        if self.wkt.is_some() && self.epsg.is_none() && id.len() > 50 {
            // Long WKT is unreadable in messages
            return write!(f, "WKT:{}...", &id[..id.char_indices().nth(50).map_or(id.len(), |(i, _)| i)]);
        }
        write!(f, "{}", id)
    }
}

impl From<String> for CRS {
    fn from(s: String) -> Self {
        CRS::parse(&s)
    }
}

impl From<CRS> for String {
    fn from(crs: CRS) -> Self {
        crs.identifier()
    }
}

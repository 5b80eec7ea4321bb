//! I/O for reading and writing vector layers
//!
//! - `wkb`: well-known binary geometry codec, used at storage boundaries
//! - `geojson`: GeoJSON feature collections with CRS metadata

pub mod geojson;
pub mod wkb;

pub use geojson::{read_geojson, read_geojson_from_str, to_geojson_string, write_geojson};

//! Feature stores: named, persisted layers
//!
//! A store holds feature collections under table names. Operations can
//! read their inputs from a store instead of from in-memory collections
//! ([`Layer::Table`]) and persist their results as new tables.
//!
//! Reads take `&self` and writes take `&mut self`, so schema changes
//! (creating, overwriting or dropping a table) can never overlap with
//! reads of the same store.

mod geojson_dir;
mod memory;

pub use geojson_dir::GeoJsonStore;
pub use memory::MemoryStore;

use crate::error::{Error, Result};
use crate::vector::FeatureCollection;
use std::borrow::Cow;

/// A backing store of named feature tables
pub trait FeatureStore {
    /// Whether a table with this name exists
    fn has_table(&self, name: &str) -> bool;

    /// Read a whole table
    fn read_table(&self, name: &str) -> Result<FeatureCollection>;

    /// Create a table. Fails with [`Error::TableExists`] unless `overwrite`.
    fn write_table(&mut self, name: &str, features: &FeatureCollection, overwrite: bool) -> Result<()>;

    /// Remove a table; returns whether it existed
    fn drop_table(&mut self, name: &str) -> Result<bool>;

    /// Names of all tables, sorted
    fn table_names(&self) -> Result<Vec<String>>;
}

/// Where an operation reads one of its input layers from
#[derive(Debug, Clone, Copy)]
pub enum Layer<'a> {
    /// An in-memory collection owned by the caller
    Collection(&'a FeatureCollection),
    /// A table in the session's store
    Table(&'a str),
}

impl<'a> Layer<'a> {
    /// Materialize the layer, borrowing in-memory collections as-is.
    pub fn resolve<S: FeatureStore + ?Sized>(&self, store: &S) -> Result<Cow<'a, FeatureCollection>> {
        match *self {
            Layer::Collection(fc) => Ok(Cow::Borrowed(fc)),
            Layer::Table(name) => {
                if !store.has_table(name) {
                    return Err(Error::TableNotFound(name.to_string()));
                }
                store.read_table(name).map(Cow::Owned)
            }
        }
    }
}

impl<'a> From<&'a FeatureCollection> for Layer<'a> {
    fn from(fc: &'a FeatureCollection) -> Self {
        Layer::Collection(fc)
    }
}

/// Table names are restricted to `[A-Za-z0-9_-]`, starting with a letter or `_`.
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name: "table",
            value: name.to_string(),
            reason: "table names use letters, digits, '_' and '-' and start with a letter or '_'"
                .into(),
        })
    }
}

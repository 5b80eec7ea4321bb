//! In-process store keeping rows as WKB-encoded geometry plus attributes

use super::{validate_table_name, FeatureStore};
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::io::wkb;
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct StoredRow {
    geometry: Option<Vec<u8>>,
    properties: BTreeMap<String, AttributeValue>,
    id: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct Table {
    rows: Vec<StoredRow>,
    crs: Option<CRS>,
}

/// A store living in memory for the lifetime of the value.
///
/// Geometries cross the store boundary as WKB, the same way they would
/// with an on-disk spatial database, so reads always return fresh copies.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureStore for MemoryStore {
    fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    fn read_table(&self, name: &str) -> Result<FeatureCollection> {
        let table = self
            .tables
            .get(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))?;

        let features = table
            .rows
            .iter()
            .map(|row| {
                let geometry = row.geometry.as_deref().map(wkb::decode).transpose()?;
                Ok(Feature {
                    geometry,
                    properties: row.properties.clone(),
                    id: row.id.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FeatureCollection {
            features,
            crs: table.crs.clone(),
        })
    }

    fn write_table(&mut self, name: &str, features: &FeatureCollection, overwrite: bool) -> Result<()> {
        validate_table_name(name)?;
        if !overwrite && self.has_table(name) {
            return Err(Error::TableExists(name.to_string()));
        }

        let rows = features
            .iter()
            .map(|f| {
                Ok(StoredRow {
                    geometry: f.geometry.as_ref().map(wkb::encode).transpose()?,
                    properties: f.properties.clone(),
                    id: f.id.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(table = name, rows = rows.len(), "memory store write");
        self.tables.insert(
            name.to_string(),
            Table {
                rows,
                crs: features.crs.clone(),
            },
        );
        Ok(())
    }

    fn drop_table(&mut self, name: &str) -> Result<bool> {
        Ok(self.tables.remove(name).is_some())
    }

    fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }
}

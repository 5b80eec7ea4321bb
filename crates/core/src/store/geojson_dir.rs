//! Directory-backed store: one `<table>.geojson` file per table

use super::{validate_table_name, FeatureStore};
use crate::error::{Error, Result};
use crate::io::geojson::{read_geojson, write_geojson};
use crate::vector::FeatureCollection;
use std::fs;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "geojson";

/// A store persisting each table as a GeoJSON file in one directory.
#[derive(Debug, Clone)]
pub struct GeoJsonStore {
    root: PathBuf,
}

impl GeoJsonStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, name: &str) -> Result<PathBuf> {
        validate_table_name(name)?;
        Ok(self.root.join(format!("{name}.{EXTENSION}")))
    }
}

impl FeatureStore for GeoJsonStore {
    fn has_table(&self, name: &str) -> bool {
        self.table_path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn read_table(&self, name: &str) -> Result<FeatureCollection> {
        let path = self.table_path(name)?;
        if !path.is_file() {
            return Err(Error::TableNotFound(name.to_string()));
        }
        read_geojson(path)
    }

    fn write_table(&mut self, name: &str, features: &FeatureCollection, overwrite: bool) -> Result<()> {
        let path = self.table_path(name)?;
        if !overwrite && path.exists() {
            return Err(Error::TableExists(name.to_string()));
        }
        // Write next to the target and rename, so readers never see half a file
        let tmp = self.root.join(format!(".{name}.{EXTENSION}.tmp"));
        write_geojson(features, &tmp)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(table = name, path = %path.display(), rows = features.len(), "geojson store write");
        Ok(())
    }

    fn drop_table(&mut self, name: &str) -> Result<bool> {
        let path = self.table_path(name)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    fn table_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_table_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;
    use crate::vector::Feature;
    use geo_types::polygon;

    #[test]
    fn test_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = GeoJsonStore::open(dir.path().join("layers")).unwrap();

        let mut fc = FeatureCollection::new().with_crs(CRS::from_epsg(32633));
        fc.push(
            Feature::new(polygon![(x: 0.0, y: 0.0), (x: 3.0, y: 0.0), (x: 3.0, y: 3.0), (x: 0.0, y: 0.0)])
                .with_property("code", "A1"),
        );

        store.write_table("blocks", &fc, false).unwrap();
        assert!(store.has_table("blocks"));
        assert_eq!(store.table_names().unwrap(), vec!["blocks".to_string()]);

        let back = store.read_table("blocks").unwrap();
        assert_eq!(back.crs, fc.crs);
        assert_eq!(back.features[0].geometry, fc.features[0].geometry);

        assert!(matches!(store.write_table("blocks", &fc, false), Err(Error::TableExists(_))));
        assert!(store.drop_table("blocks").unwrap());
        assert!(!store.has_table("blocks"));
    }

    #[test]
    fn test_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = GeoJsonStore::open(dir.path()).unwrap();
        assert!(!store.has_table("../x"));
        assert!(store.write_table("../x", &FeatureCollection::new(), true).is_err());
    }
}

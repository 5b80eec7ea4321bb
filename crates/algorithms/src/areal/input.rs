//! Identifier and value columns of the input layers

use arealis_core::{AttributeValue, Error, FeatureCollection, FeatureId, Result};
use std::collections::HashSet;

/// Read the identifier column. Every feature needs a unique integer or
/// string identifier.
pub fn collect_ids(layer: &FeatureCollection, column: &str, side: &str) -> Result<Vec<FeatureId>> {
    let mut seen = HashSet::with_capacity(layer.len());
    layer
        .iter()
        .enumerate()
        .map(|(row, feature)| {
            let value = feature.get_property(column).unwrap_or(&AttributeValue::Null);
            if value.is_null() {
                return Err(Error::schema(format!(
                    "{side} identifier `{column}` is null in row {row}"
                )));
            }
            let id = FeatureId::from_attribute(value).ok_or_else(|| {
                Error::schema(format!(
                    "{side} identifier `{column}` must be an integer or string, found {} in row {row}",
                    value.type_name()
                ))
            })?;
            if !seen.insert(id.clone()) {
                return Err(Error::schema(format!(
                    "{side} identifier `{column}` is not unique: `{id}` repeats in row {row}"
                )));
            }
            Ok(id)
        })
        .collect()
}

/// Read a numeric variable. Missing attributes and nulls become `None`.
pub fn collect_values(layer: &FeatureCollection, column: &str) -> Result<Vec<Option<f64>>> {
    layer
        .iter()
        .enumerate()
        .map(|(row, feature)| match feature.get_property(column) {
            None => Ok(None),
            Some(v) if v.is_null() => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                Error::schema(format!(
                    "variable `{column}` must be numeric, found {} in row {row}",
                    v.type_name()
                ))
            }),
        })
        .collect()
}

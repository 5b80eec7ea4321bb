//! Interpolation against a backing store
//!
//! A [`Session`] borrows a store and a geometry backend for the duration
//! of a call. Inputs may be in-memory collections or stored tables, and
//! the result is either returned or written as a new table.

use super::assemble::{Diagnostic, ResultSet};
use super::params::InterpolationParams;
use arealis_core::store::validate_table_name;
use arealis_core::{Error, FeatureStore, GeometryBackend, Layer, Result};

/// Where the result of a call goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink<'a> {
    /// Return the result set to the caller
    Memory,
    /// Persist the result as a table in the session's store
    Table { name: &'a str, overwrite: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Memory(ResultSet),
    Table {
        name: String,
        rows: usize,
        diagnostics: Vec<Diagnostic>,
    },
}

impl Output {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Output::Memory(rs) => &rs.diagnostics,
            Output::Table { diagnostics, .. } => diagnostics,
        }
    }

    pub fn into_result_set(self) -> Option<ResultSet> {
        match self {
            Output::Memory(rs) => Some(rs),
            Output::Table { .. } => None,
        }
    }
}

/// Store and backend handles for one or more interpolation calls.
///
/// The session holds the store mutably, so nothing else can change the
/// store's tables while it is alive.
pub struct Session<'s, S: FeatureStore + ?Sized, B: GeometryBackend + ?Sized> {
    store: &'s mut S,
    backend: &'s B,
}

impl<'s, S: FeatureStore + ?Sized, B: GeometryBackend + ?Sized> Session<'s, S, B> {
    pub fn new(store: &'s mut S, backend: &'s B) -> Self {
        Self { store, backend }
    }

    pub fn store(&self) -> &S {
        &*self.store
    }

    pub fn backend(&self) -> &B {
        self.backend
    }

    /// Run one interpolation call.
    ///
    /// An existing output table without `overwrite` fails before any input
    /// is read.
    pub fn interpolate(
        &mut self,
        target: Layer<'_>,
        source: Layer<'_>,
        params: &InterpolationParams,
        sink: Sink<'_>,
    ) -> Result<Output> {
        if let Sink::Table { name, overwrite } = sink {
            validate_table_name(name)?;
            if !overwrite && self.store.has_table(name) {
                return Err(Error::TableExists(name.to_string()));
            }
        }

        let target = target.resolve(&*self.store)?;
        let source = source.resolve(&*self.store)?;
        let result = super::interpolate(self.backend, &target, &source, params)?;

        match sink {
            Sink::Memory => Ok(Output::Memory(result)),
            Sink::Table { name, overwrite } => {
                let rows = result.len();
                let diagnostics = result.diagnostics.clone();
                self.store
                    .write_table(name, &result.into_feature_collection(), overwrite)?;
                tracing::info!(table = name, rows, "interpolation result stored");
                Ok(Output::Table {
                    name: name.to_string(),
                    rows,
                    diagnostics,
                })
            }
        }
    }
}

/// One-shot helper: open a session, run a single call, release it
pub fn interpolate_layers<S, B>(
    store: &mut S,
    backend: &B,
    target: Layer<'_>,
    source: Layer<'_>,
    params: &InterpolationParams,
    sink: Sink<'_>,
) -> Result<Output>
where
    S: FeatureStore + ?Sized,
    B: GeometryBackend + ?Sized,
{
    Session::new(store, backend).interpolate(target, source, params, sink)
}

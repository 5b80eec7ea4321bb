//! # Arealis Core
//!
//! Core types, traits and I/O for the Arealis areal interpolation library.
//!
//! This crate provides:
//! - `Feature` / `FeatureCollection`: polygon layers with attributes and CRS
//! - `CRS`: Coordinate Reference System handling and pure-Rust reprojection
//! - `GeometryBackend`: the geometric operations interpolation consumes
//! - `FeatureStore`: named, persisted layers (in memory or GeoJSON on disk)
//! - I/O for WKB and GeoJSON
//! - Algorithm traits for a consistent API

pub mod crs;
pub mod error;
pub mod geometry;
pub mod io;
pub mod store;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, ErrorKind, Result};
pub use geometry::{GeoBackend, GeometryBackend};
pub use store::{FeatureStore, GeoJsonStore, Layer, MemoryStore};
pub use vector::{AttributeValue, Feature, FeatureCollection, FeatureId};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::geometry::{GeoBackend, GeometryBackend};
    pub use crate::store::{FeatureStore, GeoJsonStore, Layer, MemoryStore};
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection, FeatureId};
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in Arealis.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}

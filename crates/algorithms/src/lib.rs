//! # Arealis Algorithms
//!
//! Areal interpolation algorithms for Arealis.
//!
//! ## Available Algorithms
//!
//! - **areal**: areal-weighted interpolation of extensive and intensive
//!   variables from source polygons onto target polygons

pub mod areal;
pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::areal::{
        interpolate, interpolate_layers, ArealInterpolation, Diagnostic, DiagnosticKind,
        InterpolationInput, InterpolationParams, InterpolationPlan, NullSourcePolicy, Output,
        OverlapStrategy, ResultSet, Session, Sink, WeightPolicy,
    };
    pub use arealis_core::prelude::*;
}

//! Error types for Arealis

use thiserror::Error;

/// Main error type for Arealis operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("CRS missing on {side} layer")]
    MissingCrs { side: &'static str },

    #[error("Unsupported reprojection: {from} -> {to}")]
    UnsupportedReprojection { from: String, to: String },

    #[error("Geometry backend error: {0}")]
    GeometryBackend(String),

    #[error("Geometry codec error: {0}")]
    Codec(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0} (pass overwrite to replace it)")]
    TableExists(String),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification of [`Error`] variants.
///
/// Configuration and schema errors are always raised before any geometry
/// work starts; geometry backend errors come from malformed input
/// geometries; storage errors come from reading or writing layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Schema,
    GeometryBackend,
    Storage,
}

impl Error {
    /// Which part of the error taxonomy this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_)
            | Error::CrsMismatch(..)
            | Error::MissingCrs { .. }
            | Error::InvalidParameter { .. }
            | Error::TableExists(_) => ErrorKind::Configuration,
            Error::Schema(_) => ErrorKind::Schema,
            Error::GeometryBackend(_)
            | Error::Codec(_)
            | Error::UnsupportedReprojection { .. } => ErrorKind::GeometryBackend,
            Error::Io(_) | Error::Json(_) | Error::TableNotFound(_) | Error::Other(_) => {
                ErrorKind::Storage
            }
        }
    }

    /// Shorthand for [`Error::Configuration`]
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Shorthand for [`Error::Schema`]
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }
}

/// Result type alias for Arealis operations
pub type Result<T> = std::result::Result<T, Error>;

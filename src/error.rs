//! Error types for ESPA archive loading and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EspaError>;

/// Errors that can occur while loading or validating an ESPA raster set.
#[derive(Error, Debug)]
pub enum EspaError {
    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing error in the metadata document
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// TIFF decoding error for a band raster file
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Raster file decoded, but its pixel layout cannot be used as a band
    #[error("unsupported raster {path:?}: {reason}")]
    UnsupportedRaster {
        /// Path of the offending raster file
        path: PathBuf,
        /// Why the decoded pixels are unusable
        reason: String,
    },

    /// Raw node structure or value does not match the declared schema
    #[error("schema mismatch in `{entity}`: {message}")]
    SchemaMismatch {
        /// Schema entity being decoded
        entity: &'static str,
        /// Description of the mismatch
        message: String,
    },

    /// Required field still unset when the entity was validated
    #[error("missing required field `{field}` in `{entity}`")]
    MissingField {
        /// Schema entity that was validated
        entity: &'static str,
        /// Name of the missing field
        field: &'static str,
    },

    /// Band dimensions differ from the reference band
    #[error("band `{band}` does not match the reference band dimensions")]
    DimensionMismatch {
        /// The offending band
        band: String,
    },

    /// Band pixel size differs from the reference band
    #[error("band `{band}` does not match the reference band pixel size")]
    PixelSizeMismatch {
        /// The offending band
        band: String,
    },

    /// Validation requires at least one band to pick a reference from
    #[error("raster set contains no bands")]
    EmptyBandSet,

    /// A requested band name is not present in the raster set
    #[error("band `{0}` unavailable")]
    UnknownBand(String),

    /// Fewer than three bands could be resolved for an RGB composite
    #[error("cannot resolve RGB band triple: {reason}")]
    InsufficientBands {
        /// Why the triple could not be resolved
        reason: String,
    },
}

impl EspaError {
    /// Create a schema mismatch error with a message.
    pub fn schema_mismatch(entity: &'static str, message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            entity,
            message: message.into(),
        }
    }

    /// Create an insufficient bands error with a reason.
    pub fn insufficient_bands(reason: impl Into<String>) -> Self {
        Self::InsufficientBands {
            reason: reason.into(),
        }
    }
}

//! Error types for raster processing.

use sky_common::SkyError;
use thiserror::Error;

/// Errors that can occur while reading, writing or resampling rasters.
#[derive(Error, Debug)]
pub enum RasterError {
    /// The raster file does not exist.
    #[error("raster not found: {0}")]
    NotFound(String),

    /// Failed to open or read the raster file.
    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    /// The FITS header is malformed or lacks a required card.
    #[error("invalid FITS header in {path}: {reason}")]
    InvalidHeader { path: String, reason: String },

    /// The header does not describe a usable sky projection.
    #[error("invalid WCS in {path}: {reason}")]
    InvalidWcs { path: String, reason: String },

    /// The requested window is outside the raster.
    #[error("requested window {requested} is outside raster {raster}")]
    OutOfBounds { requested: String, raster: String },

    /// Failed to write a raster.
    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },
}

impl RasterError {
    /// Create a ReadFailed error.
    pub fn read_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidHeader error.
    pub fn invalid_header(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHeader {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidWcs error.
    pub fn invalid_wcs(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidWcs {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a WriteFailed error.
    pub fn write_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;

impl From<RasterError> for SkyError {
    fn from(err: RasterError) -> Self {
        match err {
            RasterError::NotFound(path) => SkyError::SourceMissing(path),
            RasterError::ReadFailed { path, reason }
            | RasterError::InvalidHeader { path, reason }
            | RasterError::InvalidWcs { path, reason } => SkyError::SourceReadFailure { path, reason },
            RasterError::OutOfBounds { requested, raster } => SkyError::SourceReadFailure {
                path: raster,
                reason: format!("window {} out of bounds", requested),
            },
            RasterError::WriteFailed { path, reason } => {
                SkyError::Storage(format!("failed to write {}: {}", path, reason))
            }
        }
    }
}

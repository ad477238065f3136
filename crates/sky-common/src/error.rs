//! Error types for the sky tile services.

use thiserror::Error;

/// Result type alias using SkyError.
pub type SkyResult<T> = Result<T, SkyError>;

/// Primary error type for tile and cutout operations.
///
/// Request-level variants (coordinates, versions, layers, catalogs) terminate
/// a request. Per-source variants are caught by the band accumulation loop and
/// only degrade coverage; see [`SkyError::is_per_source`].
#[derive(Debug, Error)]
pub enum SkyError {
    // === Request Errors ===
    #[error("Invalid tile coordinate: zoom={zoom} x={x} y={y}")]
    InvalidTileCoordinate { zoom: i64, x: i64, y: i64 },

    #[error("Invalid version {version} for layer '{layer}'")]
    InvalidVersion { layer: String, version: String },

    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    #[error("Unknown catalog: {0}")]
    UnknownCatalog(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    // === Per-source Errors ===
    #[error("Source file missing: {0}")]
    SourceMissing(String),

    #[error("Scale level {level} not available for {source_id}")]
    NotAvailable { source_id: String, level: u32 },

    #[error("Failed to read source {path}: {reason}")]
    SourceReadFailure { path: String, reason: String },

    #[error("Overlap computation failed: {0}")]
    OverlapComputationFailure(String),

    // === Infrastructure Errors ===
    #[error("Failed to load catalog: {0}")]
    CatalogLoad(String),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl SkyError {
    /// Create a SourceReadFailure error.
    pub fn read_failure(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceReadFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Whether this error belongs to a single source and should be skipped
    /// rather than failing the whole tile.
    pub fn is_per_source(&self) -> bool {
        matches!(
            self,
            SkyError::SourceMissing(_)
                | SkyError::NotAvailable { .. }
                | SkyError::SourceReadFailure { .. }
                | SkyError::OverlapComputationFailure(_)
        )
    }

    /// Short machine-readable code used in JSON error bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            SkyError::InvalidTileCoordinate { .. } => "InvalidTileCoordinate",
            SkyError::InvalidVersion { .. } => "InvalidVersion",
            SkyError::UnknownLayer(_) => "UnknownLayer",
            SkyError::UnknownCatalog(_) => "UnknownCatalog",
            SkyError::InvalidParameter { .. } => "InvalidParameterValue",
            SkyError::SourceMissing(_) => "SourceMissing",
            SkyError::NotAvailable { .. } => "NotAvailable",
            SkyError::SourceReadFailure { .. } => "SourceReadFailure",
            SkyError::OverlapComputationFailure(_) => "OverlapComputationFailure",
            _ => "NoApplicableCode",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            SkyError::InvalidTileCoordinate { .. }
            | SkyError::InvalidVersion { .. }
            | SkyError::InvalidParameter { .. } => 400,

            SkyError::UnknownLayer(_) | SkyError::UnknownCatalog(_) => 404,

            _ => 500,
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for SkyError {
    fn from(err: std::io::Error) -> Self {
        SkyError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SkyError {
    fn from(err: serde_json::Error) -> Self {
        SkyError::CatalogLoad(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_400() {
        let err = SkyError::InvalidTileCoordinate { zoom: 1, x: 2, y: 0 };
        assert_eq!(err.http_status_code(), 400);

        let err = SkyError::InvalidVersion {
            layer: "sfd".into(),
            version: "7".into(),
        };
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "InvalidVersion");
    }

    #[test]
    fn test_unknown_layer_is_404() {
        assert_eq!(SkyError::UnknownLayer("nope".into()).http_status_code(), 404);
        assert_eq!(SkyError::UnknownCatalog("nope".into()).http_status_code(), 404);
    }

    #[test]
    fn test_per_source_classification() {
        assert!(SkyError::SourceMissing("a.fits".into()).is_per_source());
        assert!(SkyError::read_failure("a.fits", "truncated").is_per_source());
        assert!(SkyError::NotAvailable {
            source_id: "b".into(),
            level: 3
        }
        .is_per_source());
        assert!(!SkyError::UnknownLayer("x".into()).is_per_source());
        assert!(!SkyError::Internal("x".into()).is_per_source());
    }
}

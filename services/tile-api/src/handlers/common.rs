//! Shared helpers for the HTTP handlers.

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sky_common::SkyError;
use tokio::task::JoinError;
use tracing::{error, warn};

// ============================================================================
// Error Responses
// ============================================================================

/// A [`SkyError`] rendered as a JSON error body.
#[derive(Debug)]
pub struct ApiError(pub SkyError);

impl From<SkyError> for ApiError {
    fn from(e: SkyError) -> Self {
        Self(e)
    }
}

impl From<JoinError> for ApiError {
    fn from(e: JoinError) -> Self {
        Self(SkyError::Internal(format!("render task failed: {}", e)))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, code = self.0.error_code(), "Request failed");
        } else {
            warn!(error = %self.0, code = self.0.error_code(), "Rejected request");
        }
        let body = json!({
            "error": self.0.error_code(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// HTTP Dates
// ============================================================================

/// RFC 1123 date in GMT, as used by `Last-Modified` and `Expires`.
pub fn http_date(t: DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `If-Modified-Since`, when present and parsable.
pub fn if_modified_since(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let raw = headers.get(header::IF_MODIFIED_SINCE)?.to_str().ok()?;
    match DateTime::parse_from_rfc2822(raw.trim()) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            warn!(value = raw, error = %e, "Ignoring unparsable If-Modified-Since");
            None
        }
    }
}

const MAX_EXPIRES_SECS: u64 = 100 * 365 * 86_400;

/// `Expires` header value `secs` from now.
pub fn expires_in(secs: u64) -> String {
    let secs = secs.min(MAX_EXPIRES_SECS) as i64;
    let at = Utc::now()
        .checked_add_signed(Duration::seconds(secs))
        .unwrap_or_else(Utc::now);
    http_date(at)
}

/// Insert a header built from a string, skipping values that are not valid
/// header text.
pub fn set_header(headers: &mut HeaderMap, name: header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => warn!(header = %name, value, "Dropping invalid header value"),
    }
}

//! Health checks, Prometheus metrics, and the static blank tile.

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::PrometheusHandle;
use sky_common::SkyError;
use std::sync::Arc;
use tracing::instrument;

use super::common::{expires_in, set_header, ApiResult};
use super::tiles::{image_headers, JPEG_CONTENT_TYPE};
use crate::state::AppState;

// ============================================================================
// Health Checks
// ============================================================================

/// GET /health - Basic health check
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /ready - Ready once at least one layer is configured
pub async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    if state.layers.is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
    } else {
        (StatusCode::OK, "Ready")
    }
}

// ============================================================================
// Prometheus Metrics
// ============================================================================

/// GET /metrics - Prometheus text exposition
pub async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}

// ============================================================================
// Static Assets
// ============================================================================

/// GET /static/blank.jpg - The tile served for empty sky
#[instrument(skip(state))]
pub async fn blank_tile_handler(Extension(state): Extension<Arc<AppState>>) -> ApiResult<Response> {
    let body = tokio::fs::read(&state.blank_path)
        .await
        .map_err(|e| SkyError::Storage(format!("{}: {}", state.blank_path.display(), e)))?;
    let mut headers = image_headers(JPEG_CONTENT_TYPE, body.len(), "HIT");
    set_header(&mut headers, header::EXPIRES, &expires_in(state.settings.tile_expires_secs));
    Ok((StatusCode::OK, headers, body).into_response())
}

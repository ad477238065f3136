//! Sky tile service library.
//!
//! The binary is a thin wrapper around [`app`]; integration tests drive the
//! same router through `tower::ServiceExt::oneshot`.

pub mod config;
pub mod handlers;
pub mod layer_config;
pub mod metrics;
pub mod rendering;
pub mod state;

use axum::{extract::Extension, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the service router.
pub fn app(state: Arc<AppState>, prometheus: PrometheusHandle) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_handler))
        .route("/ready", get(handlers::ready_handler))
        // Metrics
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/metrics", get(handlers::api_metrics_handler))
        // Discovery
        .route("/api/layers", get(handlers::layers_handler))
        // Cutouts
        .route("/cutout.jpg", get(handlers::cutout_jpeg_handler))
        .route("/cutout.fits", get(handlers::cutout_fits_handler))
        // Blank tile
        .route("/static/blank.jpg", get(handlers::blank_tile_handler))
        // Tiles
        .route("/:layer/:version/:zoom/:x/:file", get(handlers::tile_handler))
        .layer(Extension(state))
        .layer(Extension(prometheus))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}

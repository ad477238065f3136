//! REST API handlers for layer discovery and service statistics.

use axum::{extract::Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

use crate::layer_config::LayerSummary;
use crate::metrics::MetricsSnapshot;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct LayersResponse {
    pub layers: Vec<LayerSummary>,
}

/// GET /api/layers - Configured layers in registry order
#[instrument(skip(state))]
pub async fn layers_handler(Extension(state): Extension<Arc<AppState>>) -> Json<LayersResponse> {
    Json(LayersResponse {
        layers: state.layers.layers().iter().map(|l| l.summary()).collect(),
    })
}

/// GET /api/metrics - JSON counters and render timings
#[instrument(skip(state))]
pub async fn api_metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Json<MetricsSnapshot> {
    let mut snapshot = state.metrics.snapshot().await;
    snapshot.source_file_reads = state.reader.reads();
    Json(snapshot)
}

//! Cutout endpoints: `GET /cutout.jpg` and `GET /cutout.fits`.

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use sky_common::SkyError;
use std::sync::Arc;
use tracing::instrument;

use super::common::{expires_in, set_header, ApiResult};
use super::tiles::{image_headers, FITS_CONTENT_TYPE, JPEG_CONTENT_TYPE};
use crate::metrics::Timer;
use crate::rendering::cutout::{cutout_fits, cutout_jpeg, CutoutQuery, CutoutRequest};
use crate::state::AppState;

fn validate(state: &AppState, query: Result<Query<CutoutQuery>, QueryRejection>) -> ApiResult<CutoutRequest> {
    let Query(query) = query.map_err(|e| SkyError::invalid_parameter("query", e.body_text()))?;
    Ok(query.validate(&state.layers, state.settings.max_cutout_size)?)
}

/// GET /cutout.jpg
#[instrument(skip(state, query))]
pub async fn cutout_jpeg_handler(
    Extension(state): Extension<Arc<AppState>>,
    query: Result<Query<CutoutQuery>, QueryRejection>,
) -> ApiResult<Response> {
    state.metrics.record_cutout();
    let req = validate(&state, query)?;

    let timer = Timer::start();
    let task_state = state.clone();
    let task_req = req.clone();
    let result = tokio::task::spawn_blocking(move || cutout_jpeg(&task_state, &task_req)).await?;
    state
        .metrics
        .record_render(&req.layer, timer.elapsed_us(), result.is_ok(), false)
        .await;
    let body = result?;

    let mut headers = image_headers(JPEG_CONTENT_TYPE, body.len(), "MISS");
    set_header(&mut headers, header::EXPIRES, &expires_in(state.settings.scratch_expires_secs));
    set_header(&mut headers, header::CACHE_CONTROL, "no-cache");
    Ok((StatusCode::OK, headers, body).into_response())
}

/// GET /cutout.fits
#[instrument(skip(state, query))]
pub async fn cutout_fits_handler(
    Extension(state): Extension<Arc<AppState>>,
    query: Result<Query<CutoutQuery>, QueryRejection>,
) -> ApiResult<Response> {
    state.metrics.record_cutout();
    let req = validate(&state, query)?;

    let timer = Timer::start();
    let task_state = state.clone();
    let task_req = req.clone();
    let result = tokio::task::spawn_blocking(move || {
        let scratch = cutout_fits(&task_state, &task_req)?;
        scratch.read()
    })
    .await?;
    state
        .metrics
        .record_render(&req.layer, timer.elapsed_us(), result.is_ok(), false)
        .await;
    let body = result?;

    let mut headers = image_headers(FITS_CONTENT_TYPE, body.len(), "MISS");
    set_header(
        &mut headers,
        header::CONTENT_DISPOSITION,
        &format!("attachment; filename=\"{}\"", req.fits_filename()),
    );
    set_header(&mut headers, header::EXPIRES, &expires_in(state.settings.scratch_expires_secs));
    set_header(&mut headers, header::CACHE_CONTROL, "no-cache");
    Ok((StatusCode::OK, headers, body).into_response())
}

//! Tile endpoint: `GET /{layer}/{version}/{zoom}/{x}/{y}.{jpg,fits}`.

use axum::{
    extract::{Extension, Path},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use sky_common::{SkyError, TileKey};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::common::{expires_in, http_date, if_modified_since, set_header, ApiResult};
use crate::metrics::Timer;
use crate::rendering::{serve_tile, tile_fits, TileOutcome, FITS_EXT, JPEG_EXT};
use crate::state::AppState;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";
pub const FITS_CONTENT_TYPE: &str = "application/fits";

/// GET /{layer}/{version}/{zoom}/{x}/{y}.jpg and .fits
#[instrument(skip(state, headers))]
pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((layer, version, zoom, x, file)): Path<(String, String, String, String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    state.metrics.record_tile_request();

    let (y, ext) = split_tile_file(&file)?;
    let (config, version) = state.layers.resolve(&layer, &version)?;
    let key = TileKey::new(
        config.id.as_str(),
        version,
        parse_coordinate("zoom", &zoom)?,
        parse_coordinate("x", &x)?,
        parse_coordinate("y", y)?,
    )?;

    match ext {
        JPEG_EXT => jpeg_tile(state, key, if_modified_since(&headers)).await,
        FITS_EXT => fits_tile(state, key).await,
        other => Err(SkyError::invalid_parameter("format", format!("unsupported tile format '{}'", other)).into()),
    }
}

async fn jpeg_tile(
    state: Arc<AppState>,
    key: TileKey,
    if_modified_since: Option<DateTime<Utc>>,
) -> ApiResult<Response> {
    let timer = Timer::start();
    let task_state = state.clone();
    let task_key = key.clone();
    let result = tokio::task::spawn_blocking(move || {
        let layer = task_state.layers.get(task_key.layer())?;
        serve_tile(&task_state, layer, &task_key, if_modified_since)
    })
    .await?;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            state.metrics.record_render(key.layer(), timer.elapsed_us(), false, false).await;
            return Err(e.into());
        }
    };

    let settings = &state.settings;
    let response = match outcome {
        TileOutcome::NotModified { last_modified } => {
            state.metrics.record_not_modified();
            let mut headers = HeaderMap::new();
            set_header(&mut headers, header::LAST_MODIFIED, &http_date(last_modified));
            (StatusCode::NOT_MODIFIED, headers).into_response()
        }
        TileOutcome::Cached { body, last_modified } => {
            state.metrics.record_cache_hit();
            let mut headers = image_headers(JPEG_CONTENT_TYPE, body.len(), "HIT");
            set_header(&mut headers, header::LAST_MODIFIED, &http_date(last_modified));
            set_header(&mut headers, header::EXPIRES, &expires_in(settings.tile_expires_secs));
            (StatusCode::OK, headers, body).into_response()
        }
        TileOutcome::Rendered { body, last_modified } => {
            state.metrics.record_cache_miss();
            state.metrics.record_render(key.layer(), timer.elapsed_us(), true, false).await;
            let mut headers = image_headers(JPEG_CONTENT_TYPE, body.len(), "MISS");
            set_header(&mut headers, header::LAST_MODIFIED, &http_date(last_modified));
            set_header(&mut headers, header::EXPIRES, &expires_in(settings.tile_expires_secs));
            (StatusCode::OK, headers, body).into_response()
        }
        TileOutcome::Uncached { scratch, partial } => {
            state.metrics.record_cache_miss();
            state.metrics.record_render(key.layer(), timer.elapsed_us(), true, partial).await;
            let body = scratch.read()?;
            drop(scratch);
            let mut headers = image_headers(JPEG_CONTENT_TYPE, body.len(), "MISS");
            set_header(&mut headers, header::LAST_MODIFIED, &http_date(Utc::now()));
            set_header(&mut headers, header::EXPIRES, &expires_in(settings.scratch_expires_secs));
            set_header(&mut headers, header::CACHE_CONTROL, "no-cache");
            (StatusCode::OK, headers, body).into_response()
        }
        TileOutcome::Blank { linked } => {
            state.metrics.record_cache_miss();
            state.metrics.record_blank();
            debug!(tile = %key, linked, "Redirecting to blank tile");
            let mut headers = HeaderMap::new();
            set_header(&mut headers, header::LOCATION, &settings.blank_tile_url);
            (StatusCode::FOUND, headers).into_response()
        }
    };
    Ok(response)
}

async fn fits_tile(state: Arc<AppState>, key: TileKey) -> ApiResult<Response> {
    let timer = Timer::start();
    let task_state = state.clone();
    let task_key = key.clone();
    let result = tokio::task::spawn_blocking(move || {
        let layer = task_state.layers.get(task_key.layer())?;
        let scratch = tile_fits(&task_state, layer, &task_key)?;
        scratch.read()
    })
    .await?;
    state
        .metrics
        .record_render(key.layer(), timer.elapsed_us(), result.is_ok(), false)
        .await;
    let body = result?;

    let mut headers = image_headers(FITS_CONTENT_TYPE, body.len(), "MISS");
    let filename = format!("{}-{}-{}-{}-{}.fits", key.layer(), key.version(), key.zoom(), key.x(), key.y());
    set_header(
        &mut headers,
        header::CONTENT_DISPOSITION,
        &format!("attachment; filename=\"{}\"", filename),
    );
    set_header(&mut headers, header::EXPIRES, &expires_in(state.settings.scratch_expires_secs));
    set_header(&mut headers, header::CACHE_CONTROL, "no-cache");
    Ok((StatusCode::OK, headers, body).into_response())
}

/// `Content-Type`, `Content-Length` and `X-Cache`.
pub fn image_headers(content_type: &str, len: usize, cache: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    set_header(&mut headers, header::CONTENT_TYPE, content_type);
    set_header(&mut headers, header::CONTENT_LENGTH, &len.to_string());
    set_header(&mut headers, header::HeaderName::from_static("x-cache"), cache);
    headers
}

/// Split `{y}.{ext}` into its parts.
fn split_tile_file(file: &str) -> Result<(&str, &str), SkyError> {
    file.rsplit_once('.')
        .filter(|(y, ext)| !y.is_empty() && !ext.is_empty())
        .ok_or_else(|| SkyError::invalid_parameter("y", format!("expected '{{y}}.jpg' or '{{y}}.fits', got '{}'", file)))
}

/// Signed parse, so negative values reach tile validation.
fn parse_coordinate(param: &str, raw: &str) -> Result<i64, SkyError> {
    raw.parse::<i64>()
        .map_err(|_| SkyError::invalid_parameter(param, format!("'{}' is not an integer", raw)))
}

//! HTTP request handlers.
//!
//! - `tiles`: versioned JPEG and FITS tiles
//! - `cutout`: one-off JPEG and FITS cutouts
//! - `api`: layer listing and JSON metrics
//! - `metrics`: health checks, Prometheus metrics, the static blank tile
//! - `common`: error bodies and HTTP date helpers

pub mod api;
pub mod common;
pub mod cutout;
pub mod metrics;
pub mod tiles;

pub use api::{api_metrics_handler, layers_handler, LayersResponse};
pub use common::{ApiError, ApiResult};
pub use cutout::{cutout_fits_handler, cutout_jpeg_handler};
pub use metrics::{blank_tile_handler, health_handler, metrics_handler, ready_handler};
pub use tiles::tile_handler;

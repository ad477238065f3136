//! Tile production.
//!
//! [`serve_tile`] is the per-tile controller:
//!
//! ```text
//! CHECK_CACHE ──► hit ──────────────────────────────────────────► SERVE
//!      │
//!      └─► miss ─► BUILD ─► no coverage ─► (link blank) ─────────► SERVE blank
//!                    │
//!                    └─► COMPOSE ─► cacheable ─► WRITE_PERMANENT ─► SERVE
//!                                  │
//!                                  └─► partial / caching off ─► WRITE_SCRATCH ─► SERVE
//! ```
//!
//! Everything here is blocking file I/O and CPU work; handlers call it from
//! `spawn_blocking`.

pub mod build;
pub mod cutout;

use chrono::{DateTime, Utc};
use raster_processor::{fits, BandImage, FitsHeader};
use sky_common::{SkyError, SkyResult, TileKey};
use storage::{CacheLookup, ScratchFile};
use tracing::{debug, info};

use crate::layer_config::LayerConfig;
use crate::state::AppState;

pub use build::{build_bands, BuildReport};

pub const JPEG_EXT: &str = "jpg";
pub const FITS_EXT: &str = "fits";

/// How a tile request was satisfied.
#[derive(Debug)]
pub enum TileOutcome {
    /// The caller's copy is current.
    NotModified { last_modified: DateTime<Utc> },
    /// Served from the tile cache without touching sources.
    Cached { body: Vec<u8>, last_modified: DateTime<Utc> },
    /// Freshly rendered and persisted.
    Rendered { body: Vec<u8>, last_modified: DateTime<Utc> },
    /// Rendered into a scratch file that is removed when dropped.
    Uncached { scratch: ScratchFile, partial: bool },
    /// No source covers the tile.
    Blank { linked: bool },
}

/// Whether renders of `layer` may enter the permanent cache.
pub fn caching_enabled(state: &AppState, layer: &LayerConfig) -> bool {
    state.settings.save_cache && layer.save_cache
}

/// Produce a JPEG tile, consulting and filling the cache.
pub fn serve_tile(
    state: &AppState,
    layer: &LayerConfig,
    key: &TileKey,
    if_modified_since: Option<DateTime<Utc>>,
) -> SkyResult<TileOutcome> {
    // CHECK_CACHE
    match state.tiles.lookup(key, JPEG_EXT, if_modified_since)? {
        CacheLookup::NotModified { last_modified } => {
            debug!(tile = %key, "Tile not modified");
            return Ok(TileOutcome::NotModified { last_modified });
        }
        CacheLookup::Hit(tile) => {
            debug!(tile = %key, bytes = tile.len, "Tile cache hit");
            let body = state.tiles.read(&tile)?;
            return Ok(TileOutcome::Cached {
                body,
                last_modified: tile.last_modified,
            });
        }
        CacheLookup::Miss => debug!(tile = %key, "Tile cache miss"),
    }

    // BUILD
    let report = build_tile_bands(state, layer, key)?;
    let cacheable = caching_enabled(state, layer) && !report.is_partial();

    if !report.has_data() {
        let linked = cacheable && layer.cache_blank;
        if linked {
            state.tiles.link_blank(key, JPEG_EXT, &state.blank_path)?;
        }
        info!(
            tile = %key,
            candidates = report.candidates,
            failures = report.failures,
            linked,
            "No coverage"
        );
        return Ok(TileOutcome::Blank { linked });
    }

    // COMPOSE
    let image = renderer::composite(&report.bands, &layer.composite)?;
    let body = renderer::encode_jpeg(&image, state.settings.jpeg_quality)?;

    // PERSIST_DECISION
    if cacheable {
        let path = state.tiles.persist(key, JPEG_EXT, &body)?;
        let last_modified = match state.tiles.lookup(key, JPEG_EXT, None)? {
            CacheLookup::Hit(tile) => tile.last_modified,
            _ => Utc::now(),
        };
        info!(
            tile = %key,
            path = %path.display(),
            contributed = report.contributed,
            "Rendered and cached tile"
        );
        Ok(TileOutcome::Rendered { body, last_modified })
    } else {
        let scratch = state.tiles.scratch(JPEG_EXT, &body)?;
        info!(
            tile = %key,
            contributed = report.contributed,
            failures = report.failures,
            "Rendered uncached tile"
        );
        Ok(TileOutcome::Uncached {
            scratch,
            partial: report.is_partial(),
        })
    }
}

/// Raw accumulated bands of a tile as a float32 FITS file. Never cached.
pub fn tile_fits(state: &AppState, layer: &LayerConfig, key: &TileKey) -> SkyResult<ScratchFile> {
    let report = build_tile_bands(state, layer, key)?;
    let mut cards = band_cards(layer, key.version(), &layer.bands);
    cards.set("ZOOM", key.zoom() as i64);
    cards.set("TILEX", key.x() as i64);
    cards.set("TILEY", key.y() as i64);
    let bytes = encode_fits(&cards, report.bands)?;
    state.tiles.scratch(FITS_EXT, &bytes)
}

fn build_tile_bands(state: &AppState, layer: &LayerConfig, key: &TileKey) -> SkyResult<BuildReport> {
    let (grid, _, _) = projection::projection_for(key.zoom() as i64, key.x() as i64, key.y() as i64)?;
    let bands: Vec<&str> = layer.bands.iter().map(String::as_str).collect();
    let report = build_bands(state, layer, &bands, &grid, key.zoom())?;
    state
        .metrics
        .record_sources(report.contributed as u64, report.skipped as u64);
    Ok(report)
}

/// Cards describing the survey and band order of an export.
pub fn band_cards(layer: &LayerConfig, version: u32, bands: &[String]) -> FitsHeader {
    let mut cards = FitsHeader::new();
    cards.set("SURVEY", layer.title.as_str());
    cards.set("VERSION", version as i64);
    cards.set("BANDS", bands.concat());
    for (i, band) in bands.iter().enumerate() {
        cards.set(&format!("BAND{}", i), band.as_str());
    }
    cards
}

/// A single band as a 2-D image, several as a cube.
pub fn encode_fits(cards: &FitsHeader, bands: Vec<BandImage>) -> SkyResult<Vec<u8>> {
    let mut planes: Vec<_> = bands.into_iter().map(BandImage::into_raster).collect();
    let mut bytes = Vec::new();
    let written = if planes.len() == 1 {
        fits::write_image(&mut bytes, cards, &planes.remove(0))
    } else {
        fits::write_cube(&mut bytes, cards, &planes)
    };
    written.map_err(|e| SkyError::Render(format!("FITS encoding failed: {}", e)))?;
    Ok(bytes)
}

//! One-off cutouts around a sky position.
//!
//! A cutout runs the same band build as a tile, on a synthesized TAN
//! projection instead of a grid cell. Results are never persisted.

use projection::TanWcs;
use raster_processor::{tan_cards, BandImage};
use serde::Deserialize;
use sky_common::{SkyCoord, SkyError, SkyResult};
use storage::ScratchFile;
use tracing::info;

use super::build::build_bands;
use super::{band_cards, encode_fits, FITS_EXT};
use crate::layer_config::{LayerConfig, LayerRegistry};
use crate::state::AppState;

/// Native brick pixel scale in arcseconds; zoom 14 reads it unscaled.
pub const NATIVE_PIXSCALE: f64 = 0.262;

const NATIVE_ZOOM: f64 = 14.0;
const MAX_EFFECTIVE_ZOOM: f64 = 16.0;
const DEFAULT_SIZE: usize = 256;

/// Query parameters of `/cutout.jpg` and `/cutout.fits`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CutoutQuery {
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    /// Arcseconds per pixel.
    pub pixscale: Option<f64>,
    pub size: Option<usize>,
    pub width: Option<usize>,
    pub height: Option<usize>,
    pub layer: Option<String>,
    /// Band subset: comma separated, or one character per band.
    pub bands: Option<String>,
}

/// A validated cutout request.
#[derive(Debug, Clone, PartialEq)]
pub struct CutoutRequest {
    pub center: SkyCoord,
    pub pixscale: f64,
    pub width: usize,
    pub height: usize,
    pub layer: String,
    /// Selected bands in layer order.
    pub bands: Vec<String>,
}

impl CutoutQuery {
    pub fn validate(&self, layers: &LayerRegistry, max_size: usize) -> SkyResult<CutoutRequest> {
        let ra = self
            .ra
            .ok_or_else(|| SkyError::invalid_parameter("ra", "required"))?;
        let dec = self
            .dec
            .ok_or_else(|| SkyError::invalid_parameter("dec", "required"))?;
        if !ra.is_finite() {
            return Err(SkyError::invalid_parameter("ra", format!("{} is not a number", ra)));
        }
        if !dec.is_finite() || dec.abs() > 90.0 {
            return Err(SkyError::invalid_parameter("dec", format!("{} is outside [-90, 90]", dec)));
        }

        let pixscale = self.pixscale.unwrap_or(NATIVE_PIXSCALE);
        if !(pixscale > 0.0) || !pixscale.is_finite() {
            return Err(SkyError::invalid_parameter("pixscale", "must be positive"));
        }

        let size = self.size.unwrap_or(DEFAULT_SIZE);
        let width = checked_size("width", self.width.unwrap_or(size), max_size)?;
        let height = checked_size("height", self.height.unwrap_or(size), max_size)?;

        let layer = match &self.layer {
            Some(id) => layers.get(id)?,
            None => layers
                .default_cutout_layer()
                .ok_or_else(|| SkyError::UnknownLayer("(default)".to_string()))?,
        };
        let bands = match &self.bands {
            Some(spec) => select_bands(layer, spec)?,
            None => layer.bands.clone(),
        };

        Ok(CutoutRequest {
            center: SkyCoord::new(ra.rem_euclid(360.0), dec),
            pixscale,
            width,
            height,
            layer: layer.id.clone(),
            bands,
        })
    }
}

fn checked_size(param: &str, value: usize, max_size: usize) -> SkyResult<usize> {
    if value == 0 || value > max_size {
        return Err(SkyError::invalid_parameter(
            param,
            format!("{} is outside 1..={}", value, max_size),
        ));
    }
    Ok(value)
}

/// Parse a band subset, keeping the layer's band order.
fn select_bands(layer: &LayerConfig, spec: &str) -> SkyResult<Vec<String>> {
    let spec = spec.trim();
    let requested: Vec<String> = if layer.has_band(spec) {
        vec![spec.to_string()]
    } else if spec.contains(',') {
        spec.split(',').map(|b| b.trim().to_string()).collect()
    } else {
        spec.chars().map(String::from).collect()
    };
    if requested.is_empty() {
        return Err(SkyError::invalid_parameter("bands", "no bands selected"));
    }
    if let Some(unknown) = requested.iter().find(|b| !layer.has_band(b)) {
        return Err(SkyError::invalid_parameter(
            "bands",
            format!("layer '{}' has no band '{}'", layer.id, unknown),
        ));
    }
    Ok(layer
        .bands
        .iter()
        .filter(|b| requested.contains(b))
        .cloned()
        .collect())
}

impl CutoutRequest {
    /// Zoom whose pyramid level matches the requested pixel scale.
    pub fn effective_zoom(&self) -> u32 {
        let zoom = NATIVE_ZOOM - (self.pixscale / NATIVE_PIXSCALE).log2().round();
        zoom.clamp(0.0, MAX_EFFECTIVE_ZOOM) as u32
    }

    /// Projection of the cutout; `north_up` flips rows for image output.
    pub fn projection(&self, north_up: bool) -> TanWcs {
        TanWcs::cutout(&self.center, self.pixscale, self.width, self.height, north_up)
    }

    /// `cutout_{ra}_{dec}.fits`, four decimals each.
    pub fn fits_filename(&self) -> String {
        format!("cutout_{:.4}_{:.4}.fits", self.center.ra, self.center.dec)
    }
}

/// Composited JPEG cutout. Unselected bands render as uncovered.
pub fn cutout_jpeg(state: &AppState, req: &CutoutRequest) -> SkyResult<Vec<u8>> {
    let layer = state.layers.get(&req.layer)?;
    let wcs = req.projection(true);
    let selected: Vec<&str> = req.bands.iter().map(String::as_str).collect();
    let report = build_bands(state, layer, &selected, &wcs, req.effective_zoom())?;
    state
        .metrics
        .record_sources(report.contributed as u64, report.skipped as u64);

    let mut built = req.bands.iter().zip(report.bands);
    let mut next = built.next();
    let mut bands = Vec::with_capacity(layer.bands.len());
    for band in &layer.bands {
        match next.take() {
            Some((name, image)) if name == band => {
                bands.push(image);
                next = built.next();
            }
            other => {
                next = other;
                bands.push(BandImage::empty(req.width, req.height));
            }
        }
    }

    let image = renderer::composite(&bands, &layer.composite)?;
    let body = renderer::encode_jpeg(&image, state.settings.jpeg_quality)?;
    info!(
        layer = %layer.id,
        ra = req.center.ra,
        dec = req.center.dec,
        width = req.width,
        height = req.height,
        contributed = report.contributed,
        "Rendered JPEG cutout"
    );
    Ok(body)
}

/// Float32 FITS cutout of the selected bands, with the TAN WCS.
pub fn cutout_fits(state: &AppState, req: &CutoutRequest) -> SkyResult<ScratchFile> {
    let layer = state.layers.get(&req.layer)?;
    let wcs = req.projection(false);
    let selected: Vec<&str> = req.bands.iter().map(String::as_str).collect();
    let report = build_bands(state, layer, &selected, &wcs, req.effective_zoom())?;
    state
        .metrics
        .record_sources(report.contributed as u64, report.skipped as u64);

    let mut cards = band_cards(layer, layer.latest_version(), &req.bands);
    cards.extend(&tan_cards(&wcs));
    let bytes = encode_fits(&cards, report.bands)?;
    info!(
        layer = %layer.id,
        ra = req.center.ra,
        dec = req.center.dec,
        bands = %req.bands.concat(),
        "Rendered FITS cutout"
    );
    state.tiles.scratch(FITS_EXT, &bytes)
}

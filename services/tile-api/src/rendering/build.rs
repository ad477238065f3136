//! The generic band build shared by tiles and cutouts.
//!
//! One function serves every layer: the layer record decides where sources
//! come from (footprint catalog or all-sky map), how they are located on
//! disk, which pyramid level is read and whether a model is subtracted.

use projection::{sky_footprint, SkyProjection};
use raster_processor::{
    accumulate_source, AccumulateParams, AllSkyMap, BandAccumulator, BandImage, PyramidSource, SkipReason,
    SourceOutcome,
};
use sky_common::{angular_distance, PathTemplate, SkyError, SkyResult};
use std::path::PathBuf;
use storage::Footprint;
use tracing::{debug, warn};

use crate::layer_config::{AllSkyLayer, CatalogLayer, LayerConfig, LayerSource};
use crate::state::AppState;

/// Band images of one build plus per-source bookkeeping.
#[derive(Debug)]
pub struct BuildReport {
    /// One image per requested band, in request order.
    pub bands: Vec<BandImage>,
    /// Footprints selected for the region.
    pub candidates: usize,
    /// (source, band) pairs that added pixels.
    pub contributed: usize,
    /// (source, band) pairs that added nothing, failures included.
    pub skipped: usize,
    /// (source, band) pairs that should have contributed but failed.
    pub failures: usize,
    /// Pyramid level read.
    pub level: u32,
}

impl BuildReport {
    fn empty(bands: usize, width: usize, height: usize) -> Self {
        Self {
            bands: (0..bands).map(|_| BandImage::empty(width, height)).collect(),
            candidates: 0,
            contributed: 0,
            skipped: 0,
            failures: 0,
            level: 0,
        }
    }

    /// Whether any pixel of any band has coverage.
    pub fn has_data(&self) -> bool {
        self.bands.iter().any(BandImage::has_data)
    }

    /// Some source failed; the result must not be cached.
    pub fn is_partial(&self) -> bool {
        self.failures > 0
    }

    fn record(&mut self, outcome: &SourceOutcome, source: &str, band: &str) {
        match outcome {
            SourceOutcome::Contributed { pixels } => {
                self.contributed += 1;
                debug!(source, band, pixels, "Source contributed");
            }
            SourceOutcome::Skipped(reason) => {
                self.skipped += 1;
                match reason {
                    SkipReason::NoOverlap => debug!(source, band, "Source does not overlap"),
                    SkipReason::MissingBand => debug!(source, band, "Source lacks band"),
                    SkipReason::Failed(e) => {
                        self.failures += 1;
                        warn!(source, band, error = %e, "Skipping failed source");
                    }
                }
            }
        }
    }
}

/// Accumulate `bands` of `layer` on `grid`.
///
/// `zoom` drives pyramid level selection. Errors are limited to whole-layer
/// problems (unknown or unreadable catalog, unreadable all-sky map); every
/// per-source problem is folded into the report.
pub fn build_bands<P>(state: &AppState, layer: &LayerConfig, bands: &[&str], grid: &P, zoom: u32) -> SkyResult<BuildReport>
where
    P: SkyProjection + Sync,
{
    match &layer.source {
        LayerSource::Catalog(cat) => build_catalog(state, cat, bands, grid, zoom),
        LayerSource::Allsky(sky) => build_allsky(state, &layer.id, sky, bands, grid),
    }
}

fn build_catalog<P>(state: &AppState, cat: &CatalogLayer, bands: &[&str], grid: &P, zoom: u32) -> SkyResult<BuildReport>
where
    P: SkyProjection + Sync,
{
    let index = state.catalogs.index(&cat.catalog)?;
    let (width, height) = (grid.width(), grid.height());
    let mut report = BuildReport::empty(0, width, height);

    let Some(region) = sky_footprint(grid, cat.edge_samples) else {
        return Ok(BuildReport::empty(bands.len(), width, height));
    };
    let candidates = index.select(&region.center, region.radius, &region.window);
    report.candidates = candidates.len();
    report.level = cat.levels.level_for(zoom, arcsec_per_pixel(grid));

    let params = AccumulateParams {
        margin: cat.margin,
        edge_samples: cat.edge_samples,
        interpolation: cat.interpolation,
    };
    let model_namespace = format!("{}-model", cat.pyramid);

    for &band in bands {
        let mut acc = BandAccumulator::new(width, height);
        for footprint in &candidates {
            let outcome = if footprint.has_band(band) {
                let source = SourceRef {
                    footprint,
                    band,
                    level: report.level,
                };
                offer_source(state, cat, &model_namespace, &source, grid, &params, &mut acc)
            } else {
                SourceOutcome::Skipped(SkipReason::MissingBand)
            };
            report.record(&outcome, &footprint.id, band);
        }
        report.bands.push(acc.finish());
    }

    debug!(
        catalog = %cat.catalog,
        candidates = report.candidates,
        contributed = report.contributed,
        failures = report.failures,
        level = report.level,
        "Built catalog bands"
    );
    Ok(report)
}

struct SourceRef<'a> {
    footprint: &'a Footprint,
    band: &'a str,
    level: u32,
}

/// Resolve one source at the requested level and add it to `acc`.
fn offer_source<P>(
    state: &AppState,
    cat: &CatalogLayer,
    model_namespace: &str,
    source: &SourceRef<'_>,
    grid: &P,
    params: &AccumulateParams,
    acc: &mut BandAccumulator,
) -> SourceOutcome
where
    P: SkyProjection + Sync,
{
    let image = match resolve_level(state, &cat.image, &cat.pyramid, source) {
        Ok(p) => p,
        Err(e) => return SourceOutcome::Skipped(SkipReason::Failed(e)),
    };
    let model = match &cat.model {
        Some(template) => match resolve_level(state, template, model_namespace, source) {
            Ok(p) => Some(p),
            Err(e) => return SourceOutcome::Skipped(SkipReason::Failed(e)),
        },
        None => None,
    };
    let wcs = match state.reader.tan_wcs(&image) {
        Ok(w) => w,
        Err(e) => return SourceOutcome::Skipped(SkipReason::Failed(e.into())),
    };

    accumulate_source(acc, grid, &wcs, params, |win| {
        let mut raster = state.reader.window(&image, win.x0, win.y0, win.width, win.height)?;
        if let Some(model_path) = &model {
            let model_raster = state
                .reader
                .window(model_path, win.x0, win.y0, win.width, win.height)?;
            if (model_raster.width, model_raster.height) != (raster.width, raster.height) {
                return Err(SkyError::read_failure(
                    model_path.display().to_string(),
                    "model does not match image size",
                ));
            }
            raster.subtract(&model_raster);
        }
        Ok(raster)
    })
}

/// Native path from the template, then the pyramid level.
fn resolve_level(
    state: &AppState,
    template: &PathTemplate,
    namespace: &str,
    source: &SourceRef<'_>,
) -> SkyResult<PathBuf> {
    let rel = template.render(|name| match name {
        "band" => Some(source.band),
        _ => source.footprint.field(name),
    })?;
    let native = state.data_path(rel);
    let pyramid_source = PyramidSource {
        namespace,
        id: &source.footprint.id,
        band: source.band,
        native: &native,
    };
    state.pyramid.resolve(&pyramid_source, source.level)
}

fn build_allsky<P>(state: &AppState, layer_id: &str, sky: &AllSkyLayer, bands: &[&str], grid: &P) -> SkyResult<BuildReport>
where
    P: SkyProjection + Sync,
{
    let map = state.allsky.get_or_try_init(layer_id, || {
        AllSkyMap::load(&state.reader, &state.data_path(&sky.north), &state.data_path(&sky.south))
    })?;

    let mut report = BuildReport::empty(0, grid.width(), grid.height());
    report.candidates = 1;
    for _ in bands {
        let image = map.render(grid);
        if image.has_data() {
            report.contributed += 1;
        } else {
            report.skipped += 1;
        }
        report.bands.push(image);
    }
    Ok(report)
}

/// Angular size of the central pixel of `grid` in arcseconds.
pub fn arcsec_per_pixel<P: SkyProjection>(grid: &P) -> f64 {
    let cx = (grid.width() as f64 - 1.0) / 2.0;
    let cy = (grid.height() as f64 - 1.0) / 2.0;
    match (grid.pixel_to_radec(cx, cy), grid.pixel_to_radec(cx + 1.0, cy)) {
        (Some(a), Some(b)) => angular_distance(&a, &b) * 3600.0,
        _ => f64::NAN,
    }
}

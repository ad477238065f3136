//! Application state and shared resources.

use anyhow::{Context, Result};
use raster_processor::{AllSkyMap, ScalePyramid, SourceReader};
use sky_common::TILE_SIZE;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{CatalogRegistry, GuardedRegistry, TileStore};
use tracing::info;

use crate::config::ServiceSettings;
use crate::layer_config::LayerRegistry;
use crate::metrics::MetricsCollector;

/// Shared application state.
///
/// Everything here is either immutable after startup or synchronizes
/// internally; handlers share it through an `Arc`.
pub struct AppState {
    pub settings: ServiceSettings,
    pub layers: LayerRegistry,
    /// Root for catalogs, source images and all caches.
    pub data_dir: PathBuf,
    /// Footprint indices, built on first use per catalog.
    pub catalogs: CatalogRegistry,
    /// All-sky maps, loaded on first use per layer.
    pub allsky: GuardedRegistry<AllSkyMap>,
    pub reader: Arc<SourceReader>,
    pub pyramid: ScalePyramid,
    pub tiles: TileStore,
    /// Static black tile that uncovered cache slots link to.
    pub blank_path: PathBuf,
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    /// Lay out the data directory and write the blank tile if missing.
    ///
    /// - `{data_dir}/tiles`: tile cache
    /// - `{data_dir}/scaled`: scale pyramid
    /// - `{data_dir}/tmp`: uncached renders
    /// - `{data_dir}/static/blank.jpg`: blank tile
    pub fn new(data_dir: impl Into<PathBuf>, settings: ServiceSettings, layers: LayerRegistry) -> Result<Self> {
        let data_dir = data_dir.into();
        let reader = Arc::new(SourceReader::new());
        let blank_path = data_dir.join("static").join("blank.jpg");
        ensure_blank_tile(&blank_path, settings.jpeg_quality)?;
        let blank_path = fs::canonicalize(&blank_path)
            .with_context(|| format!("resolving {}", blank_path.display()))?;

        let catalogs = CatalogRegistry::new(&data_dir, layers.catalogs().clone());
        let pyramid = ScalePyramid::new(data_dir.join("scaled"), reader.clone());
        let tiles = TileStore::new(data_dir.join("tiles"), data_dir.join("tmp"));

        info!(
            data_dir = %data_dir.display(),
            layers = layers.len(),
            save_cache = settings.save_cache,
            "Application state initialized"
        );

        Ok(Self {
            settings,
            layers,
            data_dir,
            catalogs,
            allsky: GuardedRegistry::new(),
            reader,
            pyramid,
            tiles,
            blank_path,
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    /// Absolute path of a file named relative to the data directory.
    pub fn data_path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.data_dir.join(rel)
    }
}

fn ensure_blank_tile(path: &Path, quality: u8) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    let dir = path
        .parent()
        .with_context(|| format!("no parent directory for {}", path.display()))?;
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let bytes = renderer::blank_jpeg(TILE_SIZE, quality)?;
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "Wrote blank tile");
    Ok(())
}

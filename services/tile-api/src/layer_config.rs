//! Layer configuration loader.
//!
//! Loads catalog declarations and layer definitions from YAML files in the
//! layer config directory. Every tile and cutout request is resolved against
//! this registry; a layer's record carries everything the generic build needs
//! (band list, path templates, pyramid policy, compositing parameters and
//! caching flags).

use anyhow::{bail, Context};
use raster_processor::Interpolation;
use renderer::CompositeConfig;
use serde::{Deserialize, Serialize};
use sky_common::{PathTemplate, SkyError, SkyResult};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// Layer records
// ============================================================================

/// A footprint catalog file, relative to the data directory.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogDecl {
    pub name: String,
    pub path: PathBuf,
}

/// One served layer.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerConfig {
    pub id: String,
    pub title: String,
    /// Recognized cache versions.
    pub versions: Vec<u32>,
    /// Bands in compositing order.
    pub bands: Vec<String>,
    #[serde(flatten)]
    pub source: LayerSource,
    pub composite: CompositeConfig,
    /// Persist rendered tiles for this layer.
    #[serde(default = "default_true")]
    pub save_cache: bool,
    /// Link uncovered tiles to the blank image in the cache.
    #[serde(default = "default_true")]
    pub cache_blank: bool,
}

fn default_true() -> bool {
    true
}

/// Where a layer's pixels come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayerSource {
    Catalog(CatalogLayer),
    Allsky(AllSkyLayer),
}

/// Layers built from footprint catalogs of FITS sources.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogLayer {
    pub catalog: String,
    /// Band image path relative to the data directory.
    pub image: PathTemplate,
    /// Model image; when present the layer shows image minus model.
    #[serde(default)]
    pub model: Option<PathTemplate>,
    /// Scale pyramid namespace.
    pub pyramid: String,
    #[serde(default)]
    pub levels: LevelPolicy,
    #[serde(default = "default_margin")]
    pub margin: usize,
    #[serde(default = "default_edge_samples")]
    pub edge_samples: usize,
    #[serde(default)]
    pub interpolation: Interpolation,
}

fn default_margin() -> usize {
    10
}

fn default_edge_samples() -> usize {
    3
}

/// Layers sampled from a pair of galactic hemisphere maps.
#[derive(Debug, Clone, Deserialize)]
pub struct AllSkyLayer {
    pub north: PathBuf,
    pub south: PathBuf,
}

/// How a request resolution picks a scale pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum LevelPolicy {
    /// One level per zoom step below `native_zoom`.
    Zoom {
        #[serde(default = "default_native_zoom")]
        native_zoom: u32,
        #[serde(default = "default_min_level")]
        min_level: u32,
        #[serde(default = "default_max_level")]
        max_level: u32,
    },
    /// Level from the ratio of tile to native pixel scale.
    PixelScale {
        native_arcsec: f64,
        native_zoom: u32,
        #[serde(default = "default_min_level")]
        min_level: u32,
        #[serde(default = "default_max_level")]
        max_level: u32,
    },
    /// Always read native resolution.
    Native,
}

fn default_native_zoom() -> u32 {
    14
}

fn default_min_level() -> u32 {
    1
}

fn default_max_level() -> u32 {
    8
}

impl Default for LevelPolicy {
    fn default() -> Self {
        LevelPolicy::Zoom {
            native_zoom: default_native_zoom(),
            min_level: default_min_level(),
            max_level: default_max_level(),
        }
    }
}

impl LevelPolicy {
    /// Pyramid level for a request at `zoom` whose pixels span
    /// `arcsec_per_px`.
    pub fn level_for(&self, zoom: u32, arcsec_per_px: f64) -> u32 {
        match *self {
            LevelPolicy::Native => 0,
            LevelPolicy::Zoom {
                native_zoom,
                min_level,
                max_level,
            } => {
                if zoom >= native_zoom {
                    0
                } else {
                    (native_zoom - zoom).clamp(min_level, max_level)
                }
            }
            LevelPolicy::PixelScale {
                native_arcsec,
                native_zoom,
                min_level,
                max_level,
            } => {
                if zoom >= native_zoom {
                    return 0;
                }
                let steps = (arcsec_per_px / native_arcsec).log2().floor();
                if !steps.is_finite() {
                    return min_level;
                }
                (steps.max(0.0) as u32).clamp(min_level, max_level)
            }
        }
    }

    fn check(&self) -> anyhow::Result<()> {
        let (min_level, max_level) = match *self {
            LevelPolicy::Native => return Ok(()),
            LevelPolicy::Zoom {
                min_level, max_level, ..
            } => (min_level, max_level),
            LevelPolicy::PixelScale {
                native_arcsec,
                min_level,
                max_level,
                ..
            } => {
                if !(native_arcsec > 0.0) {
                    bail!("native_arcsec must be positive");
                }
                (min_level, max_level)
            }
        };
        if min_level > max_level {
            bail!("min_level {} exceeds max_level {}", min_level, max_level);
        }
        Ok(())
    }
}

impl LayerConfig {
    pub fn kind(&self) -> &'static str {
        match self.source {
            LayerSource::Catalog(_) => "catalog",
            LayerSource::Allsky(_) => "allsky",
        }
    }

    pub fn latest_version(&self) -> u32 {
        self.versions.iter().copied().max().unwrap_or(1)
    }

    pub fn has_version(&self, version: u32) -> bool {
        self.versions.contains(&version)
    }

    pub fn has_band(&self, band: &str) -> bool {
        self.bands.iter().any(|b| b == band)
    }

    /// Registry listing for the layers API.
    pub fn summary(&self) -> LayerSummary {
        LayerSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            versions: self.versions.clone(),
            bands: self.bands.clone(),
            kind: self.kind().to_string(),
        }
    }

    fn check(&self, catalogs: &HashMap<String, PathBuf>) -> anyhow::Result<()> {
        if self.versions.is_empty() {
            bail!("no versions");
        }
        if self.bands.is_empty() {
            bail!("no bands");
        }
        self.composite.validate()?;
        if self.composite.band_count() != self.bands.len() {
            bail!(
                "composite uses {} bands but the layer lists {}",
                self.composite.band_count(),
                self.bands.len()
            );
        }
        match &self.source {
            LayerSource::Catalog(c) => {
                if !catalogs.contains_key(&c.catalog) {
                    bail!("undeclared catalog '{}'", c.catalog);
                }
                if c.edge_samples < 2 {
                    bail!("edge_samples must be at least 2");
                }
                c.levels.check()?;
            }
            LayerSource::Allsky(_) => {
                if self.bands.len() != 1 {
                    bail!("all-sky layers have exactly one band");
                }
            }
        }
        Ok(())
    }
}

/// Public description of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSummary {
    pub id: String,
    pub title: String,
    pub versions: Vec<u32>,
    pub bands: Vec<String>,
    pub kind: String,
}

// ============================================================================
// YAML Parsing Structures
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct YamlLayerFile {
    #[serde(default)]
    catalogs: Vec<CatalogDecl>,
    #[serde(default)]
    layers: Vec<LayerConfig>,
}

// ============================================================================
// Registry
// ============================================================================

/// All configured layers, in load order.
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    layers: Vec<LayerConfig>,
    index: HashMap<String, usize>,
    catalogs: HashMap<String, PathBuf>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.yaml` / `*.yml` file in `config_dir`, in name order.
    ///
    /// A missing directory yields an empty registry. Unparsable files,
    /// duplicate ids and invalid layers fail the load.
    pub fn load_from_directory<P: AsRef<Path>>(config_dir: P) -> anyhow::Result<Self> {
        let dir = config_dir.as_ref();
        let mut registry = Self::new();
        if !dir.exists() {
            warn!(path = ?dir, "Layers config directory not found");
            return Ok(registry);
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("reading {}", dir.display()))?
            .flatten()
            .map(|e| e.path())
            .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("yaml") | Some("yml")))
            .collect();
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let file: YamlLayerFile =
                serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
            info!(
                path = %path.display(),
                catalogs = file.catalogs.len(),
                layers = file.layers.len(),
                "Loaded layer config"
            );
            files.push(file);
        }
        registry.add_files(files)?;

        info!(
            layers = registry.len(),
            catalogs = registry.catalogs.len(),
            "Layer config registry loaded"
        );
        Ok(registry)
    }

    /// Build from a single YAML document.
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let file: YamlLayerFile = serde_yaml::from_str(yaml).context("parsing layer config")?;
        let mut registry = Self::new();
        registry.add_files(vec![file])?;
        Ok(registry)
    }

    /// Catalogs are collected from all files before layers are checked, so
    /// a layer may reference a catalog declared in another file.
    fn add_files(&mut self, files: Vec<YamlLayerFile>) -> anyhow::Result<()> {
        let mut layers = Vec::new();
        for file in files {
            for decl in file.catalogs {
                if self.catalogs.insert(decl.name.clone(), decl.path).is_some() {
                    bail!("duplicate catalog '{}'", decl.name);
                }
            }
            layers.extend(file.layers);
        }
        for layer in layers {
            layer
                .check(&self.catalogs)
                .with_context(|| format!("invalid layer '{}'", layer.id))?;
            if self.index.contains_key(&layer.id) {
                bail!("duplicate layer '{}'", layer.id);
            }
            self.index.insert(layer.id.clone(), self.layers.len());
            self.layers.push(layer);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[LayerConfig] {
        &self.layers
    }

    /// Declared catalog paths by name.
    pub fn catalogs(&self) -> &HashMap<String, PathBuf> {
        &self.catalogs
    }

    pub fn get(&self, id: &str) -> SkyResult<&LayerConfig> {
        self.index
            .get(id)
            .map(|&i| &self.layers[i])
            .ok_or_else(|| SkyError::UnknownLayer(id.to_string()))
    }

    /// Look up a layer and check a version path segment against it.
    pub fn resolve(&self, id: &str, version: &str) -> SkyResult<(&LayerConfig, u32)> {
        let layer = self.get(id)?;
        let invalid = || SkyError::InvalidVersion {
            layer: id.to_string(),
            version: version.to_string(),
        };
        let v: u32 = version.parse().map_err(|_| invalid())?;
        if !layer.has_version(v) {
            return Err(invalid());
        }
        Ok((layer, v))
    }

    /// The layer cutouts use when the request names none.
    pub fn default_cutout_layer(&self) -> Option<&LayerConfig> {
        self.layers
            .iter()
            .find(|l| matches!(l.source, LayerSource::Catalog(_)))
    }
}

//! Lazily built, shared per-name resources.
//!
//! Each name maps to a once-cell. The outer mutex is held only long enough to
//! find or create that cell; the build itself runs inside the cell, so
//! concurrent first accesses to one name wait for a single build while other
//! names proceed independently. A failed build leaves the cell empty and the
//! next access retries.

use crate::catalog::Catalog;
use crate::footprint_index::FootprintIndex;
use once_cell::sync::OnceCell;
use sky_common::{SkyError, SkyResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::info;

/// A map from name to a value built at most once.
#[derive(Debug)]
pub struct GuardedRegistry<V> {
    cells: Mutex<HashMap<String, Arc<OnceCell<Arc<V>>>>>,
}

impl<V> Default for GuardedRegistry<V> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> GuardedRegistry<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, name: &str) -> SkyResult<Arc<OnceCell<Arc<V>>>> {
        let mut cells = self
            .cells
            .lock()
            .map_err(|_| SkyError::Internal("registry lock poisoned".to_string()))?;
        Ok(cells.entry(name.to_string()).or_default().clone())
    }

    /// The value for `name`, building it with `init` on first use.
    pub fn get_or_try_init<F>(&self, name: &str, init: F) -> SkyResult<Arc<V>>
    where
        F: FnOnce() -> SkyResult<V>,
    {
        let cell = self.cell(name)?;
        cell.get_or_try_init(|| init().map(Arc::new)).cloned()
    }

    /// The value for `name` if it has been built.
    pub fn get(&self, name: &str) -> Option<Arc<V>> {
        let cells = self.cells.lock().ok()?;
        cells.get(name)?.get().cloned()
    }
}

/// Footprint indices keyed by catalog name.
///
/// Only catalogs declared at construction can be loaded; their files are
/// read and indexed on first use.
#[derive(Debug)]
pub struct CatalogRegistry {
    data_dir: PathBuf,
    declared: HashMap<String, PathBuf>,
    indices: GuardedRegistry<FootprintIndex>,
    builds: AtomicU64,
}

impl CatalogRegistry {
    /// `declared` maps catalog names to paths relative to `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>, declared: HashMap<String, PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            declared,
            indices: GuardedRegistry::new(),
            builds: AtomicU64::new(0),
        }
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains_key(name)
    }

    /// Number of index builds performed, failed ones included.
    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    /// The index for `name`, loading the catalog on first access.
    pub fn index(&self, name: &str) -> SkyResult<Arc<FootprintIndex>> {
        let rel = self
            .declared
            .get(name)
            .ok_or_else(|| SkyError::UnknownCatalog(name.to_string()))?;
        let path = self.data_dir.join(rel);

        self.indices.get_or_try_init(name, || {
            self.builds.fetch_add(1, Ordering::Relaxed);
            let start = Instant::now();
            let catalog = Catalog::load(name, &path)?;
            let index = FootprintIndex::build(catalog);
            info!(
                catalog = name,
                footprints = index.len(),
                max_half_size = index.max_half_size(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Built footprint index"
            );
            Ok(index)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use test_utils::{catalog_json, catalogs, temp_data_dir, write_file};

    fn registry(root: &std::path::Path) -> CatalogRegistry {
        let mut declared = HashMap::new();
        declared.insert("bricks".to_string(), PathBuf::from("catalogs/bricks.json"));
        declared.insert("broken".to_string(), PathBuf::from("catalogs/broken.json"));
        CatalogRegistry::new(root, declared)
    }

    #[test]
    fn test_unknown_catalog() {
        let dir = temp_data_dir();
        let reg = registry(dir.path());
        assert!(matches!(reg.index("nope"), Err(SkyError::UnknownCatalog(_))));
        assert_eq!(reg.builds(), 0);
    }

    #[test]
    fn test_concurrent_first_access_builds_once() {
        let dir = temp_data_dir();
        write_file(
            dir.path(),
            "catalogs/bricks.json",
            catalog_json(&catalogs::brick_grid()).as_bytes(),
        );
        let reg = Arc::new(registry(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = reg.clone();
                thread::spawn(move || reg.index("bricks").unwrap())
            })
            .collect();
        let indices: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(reg.builds(), 1);
        assert!(indices.iter().all(|i| Arc::ptr_eq(i, &indices[0])));
        assert_eq!(indices[0].len(), 16);
    }

    #[test]
    fn test_failed_build_retries() {
        let dir = temp_data_dir();
        let reg = registry(dir.path());
        assert!(matches!(reg.index("broken"), Err(SkyError::CatalogLoad(_))));
        assert!(reg.indices.get("broken").is_none());

        write_file(
            dir.path(),
            "catalogs/broken.json",
            catalog_json(&catalogs::single_brick()).as_bytes(),
        );
        assert_eq!(reg.index("broken").unwrap().len(), 1);
        assert_eq!(reg.builds(), 2);
    }

    #[test]
    fn test_guarded_registry_independent_names() {
        let reg: GuardedRegistry<u32> = GuardedRegistry::new();
        assert_eq!(*reg.get_or_try_init("a", || Ok(1)).unwrap(), 1);
        assert_eq!(*reg.get_or_try_init("b", || Ok(2)).unwrap(), 2);
        assert_eq!(*reg.get_or_try_init("a", || Ok(99)).unwrap(), 1);
    }
}

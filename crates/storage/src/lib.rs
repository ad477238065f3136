//! Storage for the sky tile services.
//!
//! Provides:
//! - Footprint catalogs read from JSON files
//! - kd-tree footprint indices, built once per catalog behind a guarded registry
//! - The versioned on-disk tile cache with atomic writes

pub mod catalog;
pub mod footprint_index;
pub mod kdtree;
pub mod registry;
pub mod tile_store;

pub use catalog::{Catalog, Footprint};
pub use footprint_index::FootprintIndex;
pub use kdtree::KdTree;
pub use registry::{CatalogRegistry, GuardedRegistry};
pub use tile_store::{CacheLookup, CachedTile, ScratchFile, TileStore};

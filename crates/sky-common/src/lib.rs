//! Common types and utilities shared across the sky tile services.

pub mod error;
pub mod sky;
pub mod template;
pub mod tile;

pub use error::{SkyError, SkyResult};
pub use sky::{angular_distance, RaRange, SkyCoord, SkyWindow};
pub use template::PathTemplate;
pub use tile::{TileKey, TILE_SIZE};

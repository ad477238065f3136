//! Tile identifiers for the zoomable sky grid.

use crate::error::{SkyError, SkyResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width and height of every grid tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// Deepest zoom accepted; keeps `2^zoom * TILE_SIZE` well inside `i64`.
pub const MAX_ZOOM: u32 = 30;

/// A validated (layer, version, zoom, x, y) tile identifier.
///
/// Construction checks `0 <= x, y < 2^zoom`; a `TileKey` that exists is
/// always in range. The key names both the cache slot and the projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileKey {
    layer: String,
    version: u32,
    zoom: u32,
    x: u32,
    y: u32,
}

impl TileKey {
    /// Validate and build a tile key.
    ///
    /// Coordinates arrive signed so that negative path segments are reported
    /// as `InvalidTileCoordinate` rather than as parse failures.
    pub fn new(layer: impl Into<String>, version: u32, zoom: i64, x: i64, y: i64) -> SkyResult<Self> {
        validate_tile(zoom, x, y)?;
        Ok(Self {
            layer: layer.into(),
            version,
            zoom: zoom as u32,
            x: x as u32,
            y: y as u32,
        })
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    /// Number of tiles along each axis at this key's zoom.
    pub fn tiles_per_axis(&self) -> u64 {
        1u64 << self.zoom
    }

    /// Relative cache path: `{layer}/{version}/{zoom}/{x}/{y}.{ext}`.
    pub fn cache_path(&self, ext: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}.{}",
            self.layer, self.version, self.zoom, self.x, self.y, ext
        )
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/v{}/{}/{}/{}",
            self.layer, self.version, self.zoom, self.x, self.y
        )
    }
}

/// Check that (zoom, x, y) addresses a tile of the power-of-two grid.
pub fn validate_tile(zoom: i64, x: i64, y: i64) -> SkyResult<()> {
    let invalid = || SkyError::InvalidTileCoordinate { zoom, x, y };
    if zoom < 0 || zoom > MAX_ZOOM as i64 || x < 0 || y < 0 {
        return Err(invalid());
    }
    let n = 1i64 << zoom;
    if x >= n || y >= n {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tiles_accepted() {
        for zoom in 0..6i64 {
            let n = 1i64 << zoom;
            for x in [0, n - 1] {
                for y in [0, n - 1] {
                    assert!(TileKey::new("sfd", 1, zoom, x, y).is_ok());
                }
            }
        }
    }

    #[test]
    fn test_out_of_range_rejected() {
        let cases = [(-1, 0, 0), (0, 1, 0), (0, 0, 1), (3, 8, 0), (3, 0, -1), (2, -1, 2)];
        for (z, x, y) in cases {
            let err = TileKey::new("sfd", 1, z, x, y).unwrap_err();
            assert!(
                matches!(err, SkyError::InvalidTileCoordinate { .. }),
                "expected InvalidTileCoordinate for {:?}",
                (z, x, y)
            );
        }
    }

    #[test]
    fn test_excessive_zoom_rejected() {
        assert!(TileKey::new("sfd", 1, 31, 0, 0).is_err());
        assert!(TileKey::new("sfd", 1, 30, 0, 0).is_ok());
    }

    #[test]
    fn test_cache_path_separates_versions() {
        let a = TileKey::new("unwise-w1w2", 1, 5, 3, 7).unwrap();
        let b = TileKey::new("unwise-w1w2", 2, 5, 3, 7).unwrap();
        assert_eq!(a.cache_path("jpg"), "unwise-w1w2/1/5/3/7.jpg");
        assert_ne!(a.cache_path("jpg"), b.cache_path("jpg"));
    }
}

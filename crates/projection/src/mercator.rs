//! Mercator projection of the sky grid.
//!
//! The whole sky at zoom `z` is a `2^z * 256` pixel square in which right
//! ascension runs right-to-left from 360 to 0 degrees and declination follows
//! the Mercator latitude stretch. The reference point (RA 180, Dec 0) sits at
//! the centre of the zoom-0 tile.
//!
//! Reference pixels are kept in the FITS 1-based convention so that tile
//! projections match the headers written alongside FITS tile exports.

use crate::{SkyProjection, Wrapped};
use sky_common::tile::validate_tile;
use sky_common::{SkyCoord, SkyResult, TILE_SIZE};
use std::f64::consts::PI;

/// Right ascension of the projection's reference point in degrees.
pub const REFERENCE_RA: f64 = 180.0;

/// Mercator projection of a single tile.
#[derive(Debug, Clone, PartialEq)]
pub struct MercatorTile {
    /// Reference pixel (FITS, 1-based).
    crpix: (f64, f64),
    /// Width of the full sky in pixels at this zoom.
    world_size: f64,
    width: usize,
    height: usize,
}

impl MercatorTile {
    /// Projection for tile (x, y) at `zoom`. Coordinates must already be valid.
    pub fn for_tile(zoom: u32, x: u32, y: u32) -> Self {
        let size = TILE_SIZE as f64;
        let (rx, ry) = if zoom == 0 {
            (0.5, 0.5)
        } else {
            let half = (1u64 << (zoom - 1)) as f64;
            (half - x as f64, half - y as f64)
        };
        Self {
            crpix: (rx * size, ry * size),
            world_size: (1u64 << zoom) as f64 * size,
            width: TILE_SIZE as usize,
            height: TILE_SIZE as usize,
        }
    }

    /// Horizontal wrap period in pixels: the width of the whole sky.
    pub fn wrap_period(&self) -> f64 {
        self.world_size
    }

    /// Angular width of one pixel at the equator, in degrees.
    pub fn degrees_per_pixel(&self) -> f64 {
        360.0 / self.world_size
    }
}

impl SkyProjection for MercatorTile {
    fn pixel_to_radec(&self, x: f64, y: f64) -> Option<SkyCoord> {
        let dx = x + 1.0 - self.crpix.0;
        let dy = y + 1.0 - self.crpix.1;
        let ra = (REFERENCE_RA - dx * 360.0 / self.world_size).rem_euclid(360.0);
        let v = -dy * 2.0 * PI / self.world_size;
        let dec = (2.0 * v.exp().atan() - PI / 2.0).to_degrees();
        Some(SkyCoord::new(ra, dec))
    }

    fn radec_to_pixel(&self, coord: &SkyCoord) -> Option<(f64, f64)> {
        if coord.dec.abs() >= 90.0 || !coord.is_finite() {
            return None;
        }
        // No RA folding here: RA and RA+360 land exactly one period apart
        // and `Wrapped` brings them back next to the tile.
        let dx = (REFERENCE_RA - coord.ra) * self.world_size / 360.0;
        let v = (PI / 4.0 + coord.dec.to_radians() / 2.0).tan().ln();
        let dy = -v * self.world_size / (2.0 * PI);
        Some((self.crpix.0 + dx - 1.0, self.crpix.1 + dy - 1.0))
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }
}

/// Validate (zoom, x, y) and build the seam-wrapped tile projection.
///
/// Returns the projection with the tile's width and height.
pub fn projection_for(zoom: i64, x: i64, y: i64) -> SkyResult<(Wrapped<MercatorTile>, usize, usize)> {
    validate_tile(zoom, x, y)?;
    let tile = MercatorTile::for_tile(zoom as u32, x as u32, y as u32);
    let period = tile.wrap_period();
    let (w, h) = (tile.width, tile.height);
    Ok((Wrapped::new(tile, period), w, h))
}

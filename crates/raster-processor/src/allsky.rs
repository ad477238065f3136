//! Full-sky scalar maps stored as a pair of galactic ZEA hemispheres.

use crate::accumulate::BandImage;
use crate::error::RasterError;
use crate::interpolation::bilinear_interpolate;
use crate::raster::Raster;
use crate::reader::SourceReader;
use crate::wcs::zea_from_header;
use projection::{equatorial_to_galactic, GalacticZea, Hemisphere, SkyProjection};
use rayon::prelude::*;
use sky_common::{SkyCoord, SkyResult};
use std::path::Path;
use tracing::info;

/// One hemisphere image with its projection.
#[derive(Debug, Clone)]
pub struct HemisphereMap {
    pub projection: GalacticZea,
    pub raster: Raster,
}

/// North and south galactic hemispheres of one all-sky quantity.
#[derive(Debug, Clone)]
pub struct AllSkyMap {
    north: HemisphereMap,
    south: HemisphereMap,
}

impl AllSkyMap {
    /// Build from already loaded hemispheres.
    pub fn from_parts(north: HemisphereMap, south: HemisphereMap) -> Self {
        Self { north, south }
    }

    /// Read both hemisphere files; each must declare the expected pole.
    pub fn load(reader: &SourceReader, north_path: &Path, south_path: &Path) -> SkyResult<Self> {
        let north = load_hemisphere(reader, north_path, Hemisphere::North)?;
        let south = load_hemisphere(reader, south_path, Hemisphere::South)?;
        info!(
            north = %north_path.display(),
            south = %south_path.display(),
            width = north.raster.width,
            height = north.raster.height,
            "Loaded all-sky map"
        );
        Ok(Self { north, south })
    }

    fn hemisphere(&self, which: Hemisphere) -> &HemisphereMap {
        match which {
            Hemisphere::North => &self.north,
            Hemisphere::South => &self.south,
        }
    }

    /// Map value at an equatorial position, NaN off the map.
    pub fn sample(&self, ra: f64, dec: f64) -> f32 {
        let (l, b) = equatorial_to_galactic(&SkyCoord::new(ra, dec));
        let map = self.hemisphere(Hemisphere::for_latitude(b));
        let (x, y) = map.projection.galactic_to_pixel(l, b);
        bilinear_interpolate(&map.raster, x, y)
    }

    /// Sample the map at every pixel of `grid`.
    ///
    /// Pixels with a finite sample have coverage 1; the rest have none.
    pub fn render<P: SkyProjection + Sync>(&self, grid: &P) -> BandImage {
        let (w, h) = (grid.width(), grid.height());
        let mut values = vec![0.0f32; w * h];
        let mut coverage = vec![0u16; w * h];

        values
            .par_chunks_mut(w.max(1))
            .zip(coverage.par_chunks_mut(w.max(1)))
            .enumerate()
            .for_each(|(y, (row, cov))| {
                for x in 0..w {
                    let Some(coord) = grid.pixel_to_radec(x as f64, y as f64) else {
                        continue;
                    };
                    let v = self.sample(coord.ra, coord.dec);
                    if v.is_finite() {
                        row[x] = v;
                        cov[x] = 1;
                    }
                }
            });

        BandImage {
            values,
            coverage,
            width: w,
            height: h,
        }
    }
}

fn load_hemisphere(reader: &SourceReader, path: &Path, expected: Hemisphere) -> SkyResult<HemisphereMap> {
    let name = path.display().to_string();
    let (header, raster) = reader.image(path)?;
    let projection = zea_from_header(&header, &name)?;
    if projection.hemisphere() != expected {
        return Err(RasterError::invalid_wcs(name, format!("expected {:?} hemisphere", expected)).into());
    }
    Ok(HemisphereMap { projection, raster })
}

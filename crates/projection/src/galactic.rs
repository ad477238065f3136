//! Zenithal-equal-area projection of galactic all-sky maps.
//!
//! All-sky scalar maps (dust reddening, H-alpha) come as two images, one per
//! galactic hemisphere, each a Lambert azimuthal equal-area projection about
//! its pole. Header cards: `LAM_NSGP` (+1 north, -1 south), `LAM_SCAL`
//! (pixels per unit radius), `CRPIX1`/`CRPIX2`.

use crate::SkyProjection;
use nalgebra::{Matrix3, Vector3};
use sky_common::SkyCoord;

/// Which galactic hemisphere a map covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
}

impl Hemisphere {
    /// Hemisphere from a `LAM_NSGP` card value.
    pub fn from_nsgp(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::North),
            -1 => Some(Self::South),
            _ => None,
        }
    }

    /// Hemisphere holding galactic latitude `b`.
    pub fn for_latitude(b: f64) -> Self {
        if b >= 0.0 {
            Self::North
        } else {
            Self::South
        }
    }

    fn sign(self) -> f64 {
        match self {
            Self::North => 1.0,
            Self::South => -1.0,
        }
    }
}

/// J2000 equatorial to galactic rotation.
fn rotation() -> Matrix3<f64> {
    Matrix3::new(
        -0.054_875_560_4, -0.873_437_090_2, -0.483_835_015_5,
        0.494_109_427_9, -0.444_829_630_0, 0.746_982_244_5,
        -0.867_666_149_0, -0.198_076_373_4, 0.455_983_776_2,
    )
}

fn to_vector(lon: f64, lat: f64) -> Vector3<f64> {
    let (lon, lat) = (lon.to_radians(), lat.to_radians());
    Vector3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}

fn from_vector(v: &Vector3<f64>) -> (f64, f64) {
    let lon = v.y.atan2(v.x).to_degrees().rem_euclid(360.0);
    let lat = v.z.clamp(-1.0, 1.0).asin().to_degrees();
    (lon, lat)
}

/// Galactic (l, b) in degrees of an equatorial position.
pub fn equatorial_to_galactic(coord: &SkyCoord) -> (f64, f64) {
    from_vector(&(rotation() * to_vector(coord.ra, coord.dec)))
}

/// Equatorial position of galactic (l, b) in degrees.
pub fn galactic_to_equatorial(l: f64, b: f64) -> SkyCoord {
    let (ra, dec) = from_vector(&(rotation().transpose() * to_vector(l, b)));
    SkyCoord::new(ra, dec)
}

/// One hemisphere of a galactic ZEA map.
#[derive(Debug, Clone, PartialEq)]
pub struct GalacticZea {
    hemisphere: Hemisphere,
    lam_scal: f64,
    /// Reference pixel (FITS, 1-based).
    crpix: (f64, f64),
    width: usize,
    height: usize,
}

impl GalacticZea {
    pub fn new(hemisphere: Hemisphere, lam_scal: f64, crpix: (f64, f64), width: usize, height: usize) -> Self {
        Self {
            hemisphere,
            lam_scal,
            crpix,
            width,
            height,
        }
    }

    pub fn hemisphere(&self) -> Hemisphere {
        self.hemisphere
    }

    /// Pixel coordinate of galactic (l, b).
    pub fn galactic_to_pixel(&self, l: f64, b: f64) -> (f64, f64) {
        let n = self.hemisphere.sign();
        let (sin_l, cos_l) = l.to_radians().sin_cos();
        let r = (1.0 - n * b.to_radians().sin()).max(0.0).sqrt();
        let x = self.lam_scal * r * cos_l + self.crpix.0 - 1.0;
        let y = -self.lam_scal * n * r * sin_l + self.crpix.1 - 1.0;
        (x, y)
    }
}

impl SkyProjection for GalacticZea {
    fn pixel_to_radec(&self, x: f64, y: f64) -> Option<SkyCoord> {
        let n = self.hemisphere.sign();
        let u = (x + 1.0 - self.crpix.0) / self.lam_scal;
        let v = -(y + 1.0 - self.crpix.1) / (self.lam_scal * n);
        let r2 = u * u + v * v;
        // r^2 = 1 - n sin(b) stays within [0, 2] on the sphere
        if r2 > 2.0 {
            return None;
        }
        let b = ((1.0 - r2) / n).clamp(-1.0, 1.0).asin().to_degrees();
        let l = v.atan2(u).to_degrees();
        Some(galactic_to_equatorial(l, b))
    }

    fn radec_to_pixel(&self, coord: &SkyCoord) -> Option<(f64, f64)> {
        let (l, b) = equatorial_to_galactic(coord);
        Some(self.galactic_to_pixel(l, b))
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }
}

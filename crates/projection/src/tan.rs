//! Gnomonic (TAN) world coordinate system.
//!
//! The projection carried by brick mosaics, atlas tiles and cutouts:
//!
//! 1. Pixel to intermediate: `(xi, eta) = CD * (p - CRPIX)` in degrees
//! 2. Intermediate to sky: inverse gnomonic projection about CRVAL
//!
//! CRPIX follows the FITS 1-based convention; the trait methods take and
//! return 0-based pixel centres.

use crate::SkyProjection;
use nalgebra::{Matrix2, Vector2};
use sky_common::{SkyCoord, SkyError, SkyResult};

#[derive(Debug, Clone, PartialEq)]
pub struct TanWcs {
    crval: SkyCoord,
    crpix: Vector2<f64>,
    cd: Matrix2<f64>,
    cd_inv: Matrix2<f64>,
    width: usize,
    height: usize,
}

impl TanWcs {
    /// Build from header values. Fails if the CD matrix is singular.
    pub fn new(
        crval: SkyCoord,
        crpix: (f64, f64),
        cd: [[f64; 2]; 2],
        width: usize,
        height: usize,
    ) -> SkyResult<Self> {
        let cd = Matrix2::new(cd[0][0], cd[0][1], cd[1][0], cd[1][1]);
        let cd_inv = cd
            .try_inverse()
            .filter(|m| m.iter().all(|v| v.is_finite()))
            .ok_or_else(|| SkyError::invalid_parameter("cd", "singular CD matrix"))?;
        Ok(Self {
            crval,
            crpix: Vector2::new(crpix.0, crpix.1),
            cd,
            cd_inv,
            width,
            height,
        })
    }

    /// A one-off projection centred on `center` with square pixels.
    ///
    /// `pixscale` is in arcseconds per pixel. RA increases leftward. With
    /// `north_up` the Dec axis is flipped so that row 0 is the northern edge,
    /// which is what image formats expect; FITS output keeps row 0 south.
    pub fn cutout(center: &SkyCoord, pixscale: f64, width: usize, height: usize, north_up: bool) -> Self {
        let ps = pixscale / 3600.0;
        let dec_scale = if north_up { -ps } else { ps };
        let cd = Matrix2::new(-ps, 0.0, 0.0, dec_scale);
        let cd_inv = Matrix2::new(-1.0 / ps, 0.0, 0.0, 1.0 / dec_scale);
        Self {
            crval: *center,
            crpix: Vector2::new((width as f64 + 1.0) / 2.0, (height as f64 + 1.0) / 2.0),
            cd,
            cd_inv,
            width,
            height,
        }
    }

    pub fn crval(&self) -> SkyCoord {
        self.crval
    }

    /// Reference pixel in FITS (1-based) convention.
    pub fn crpix(&self) -> (f64, f64) {
        (self.crpix.x, self.crpix.y)
    }

    pub fn cd(&self) -> [[f64; 2]; 2] {
        [[self.cd[(0, 0)], self.cd[(0, 1)]], [self.cd[(1, 0)], self.cd[(1, 1)]]]
    }

    /// Mean pixel scale in degrees.
    pub fn pixel_scale(&self) -> f64 {
        self.cd.determinant().abs().sqrt()
    }

    /// Projection of the `w` x `h` sub-image whose first pixel is `(x0, y0)`.
    pub fn subimage(&self, x0: usize, y0: usize, w: usize, h: usize) -> Self {
        Self {
            crpix: self.crpix - Vector2::new(x0 as f64, y0 as f64),
            width: w,
            height: h,
            ..self.clone()
        }
    }

    /// Projection of this image resampled by factor `f` (0.5 halves it).
    ///
    /// Pixel edges stay aligned: `crpix' = 0.5 + f * (crpix - 0.5)` and
    /// `CD' = CD / f`.
    pub fn scale(&self, f: f64) -> Self {
        let half = Vector2::new(0.5, 0.5);
        Self {
            crval: self.crval,
            crpix: half + (self.crpix - half) * f,
            cd: self.cd / f,
            cd_inv: self.cd_inv * f,
            width: (self.width as f64 * f).floor() as usize,
            height: (self.height as f64 * f).floor() as usize,
        }
    }
}

impl SkyProjection for TanWcs {
    fn pixel_to_radec(&self, x: f64, y: f64) -> Option<SkyCoord> {
        let offset = Vector2::new(x + 1.0, y + 1.0) - self.crpix;
        let inter = self.cd * offset;
        let (xi, eta) = (inter.x.to_radians(), inter.y.to_radians());

        let ra0 = self.crval.ra.to_radians();
        let (sin_dec0, cos_dec0) = self.crval.dec.to_radians().sin_cos();
        let denom = cos_dec0 - eta * sin_dec0;

        let ra = ra0 + xi.atan2(denom);
        let dec = (sin_dec0 + eta * cos_dec0).atan2((xi * xi + denom * denom).sqrt());
        let coord = SkyCoord::new(ra.to_degrees().rem_euclid(360.0), dec.to_degrees());
        coord.is_finite().then_some(coord)
    }

    fn radec_to_pixel(&self, coord: &SkyCoord) -> Option<(f64, f64)> {
        let (sin_dec, cos_dec) = coord.dec.to_radians().sin_cos();
        let (sin_dec0, cos_dec0) = self.crval.dec.to_radians().sin_cos();
        let (sin_dra, cos_dra) = (coord.ra - self.crval.ra).to_radians().sin_cos();

        let d = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_dra;
        // Points on the far hemisphere have no tangent-plane image
        if d <= 1e-12 {
            return None;
        }
        let xi = (cos_dec * sin_dra / d).to_degrees();
        let eta = ((sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_dra) / d).to_degrees();

        let p = self.cd_inv * Vector2::new(xi, eta) + self.crpix;
        let (x, y) = (p.x - 1.0, p.y - 1.0);
        (x.is_finite() && y.is_finite()).then_some((x, y))
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }
}

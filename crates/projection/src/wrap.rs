//! Seam-wrapping decorator for cylindrical projections.

use crate::SkyProjection;
use sky_common::SkyCoord;

/// Wraps a projection whose x axis repeats every `period` pixels.
///
/// Sky-to-pixel results are folded into the period-wide window centred on
/// the image, so a source straddling RA 0/360 lands next to the tile instead
/// of a whole sky-width away. Pixel-to-sky passes through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Wrapped<P> {
    inner: P,
    period: f64,
}

impl<P: SkyProjection> Wrapped<P> {
    pub fn new(inner: P, period: f64) -> Self {
        Self { inner, period }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    /// Fold an x coordinate into `[w/2 - period/2, w/2 + period/2)`.
    ///
    /// Coordinates already inside that window, which contains the whole
    /// image whenever the image is narrower than the period, are untouched.
    pub fn wrap_x(&self, x: f64) -> f64 {
        if self.period <= 0.0 {
            return x;
        }
        let lo = self.inner.width() as f64 / 2.0 - self.period / 2.0;
        if x >= lo && x < lo + self.period {
            x
        } else {
            lo + (x - lo).rem_euclid(self.period)
        }
    }
}

impl<P: SkyProjection> SkyProjection for Wrapped<P> {
    fn pixel_to_radec(&self, x: f64, y: f64) -> Option<SkyCoord> {
        self.inner.pixel_to_radec(x, y)
    }

    fn radec_to_pixel(&self, coord: &SkyCoord) -> Option<(f64, f64)> {
        let (x, y) = self.inner.radec_to_pixel(coord)?;
        Some((self.wrap_x(x), y))
    }

    fn width(&self) -> usize {
        self.inner.width()
    }

    fn height(&self) -> usize {
        self.inner.height()
    }
}

//! Sky coordinates and RA/Dec windows.
//!
//! Right ascension is circular: a range may cross RA = 0/360, so intervals are
//! stored as a start angle plus a non-negative span instead of min/max pairs.

use serde::{Deserialize, Serialize};

/// An equatorial sky position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyCoord {
    pub ra: f64,
    pub dec: f64,
}

impl SkyCoord {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    /// Cartesian unit vector on the celestial sphere.
    pub fn unit_vector(&self) -> [f64; 3] {
        let (ra, dec) = (self.ra.to_radians(), self.dec.to_radians());
        [dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin()]
    }

    /// Whether both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.ra.is_finite() && self.dec.is_finite()
    }
}

/// Normalize an angle in degrees into [0, 360).
pub fn normalize_ra(ra: f64) -> f64 {
    let r = ra.rem_euclid(360.0);
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}

/// Signed difference `a - b` folded into (-180, 180].
pub fn ra_difference(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

/// Great-circle distance between two positions in degrees (haversine).
pub fn angular_distance(a: &SkyCoord, b: &SkyCoord) -> f64 {
    let (ra1, dec1) = (a.ra.to_radians(), a.dec.to_radians());
    let (ra2, dec2) = (b.ra.to_radians(), b.dec.to_radians());
    let sin_ddec = ((dec2 - dec1) / 2.0).sin();
    let sin_dra = ((ra2 - ra1) / 2.0).sin();
    let h = sin_ddec * sin_ddec + dec1.cos() * dec2.cos() * sin_dra * sin_dra;
    (2.0 * h.sqrt().min(1.0).asin()).to_degrees()
}

/// A circular interval of right ascension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaRange {
    /// Start of the interval in [0, 360).
    pub start: f64,
    /// Extent eastward from `start`, in [0, 360].
    pub span: f64,
}

impl RaRange {
    /// The full circle.
    pub fn full() -> Self {
        Self {
            start: 0.0,
            span: 360.0,
        }
    }

    /// Interval from `lo` to `hi` going eastward; `lo > hi` wraps through 0.
    pub fn from_bounds(lo: f64, hi: f64) -> Self {
        let start = normalize_ra(lo);
        let mut span = (hi - lo).rem_euclid(360.0);
        if span == 0.0 && (hi - lo).abs() >= 360.0 {
            span = 360.0;
        }
        Self { start, span }
    }

    pub fn is_full(&self) -> bool {
        self.span >= 360.0
    }

    pub fn contains(&self, ra: f64) -> bool {
        self.is_full() || (ra - self.start).rem_euclid(360.0) <= self.span
    }

    pub fn intersects(&self, other: &RaRange) -> bool {
        if self.is_full() || other.is_full() {
            return true;
        }
        (other.start - self.start).rem_euclid(360.0) <= self.span
            || (self.start - other.start).rem_euclid(360.0) <= other.span
    }
}

/// A rectangular RA/Dec region of the sky.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyWindow {
    pub ra: RaRange,
    pub dec_min: f64,
    pub dec_max: f64,
}

impl SkyWindow {
    pub fn new(ra: RaRange, dec_min: f64, dec_max: f64) -> Self {
        Self {
            ra,
            dec_min: dec_min.max(-90.0),
            dec_max: dec_max.min(90.0),
        }
    }

    /// Smallest window around `center` enclosing `points`.
    ///
    /// RA offsets are measured from the center so that a window straddling
    /// RA = 0 stays contiguous. A span of 360 degrees or more becomes the
    /// full circle.
    pub fn enclosing(center: &SkyCoord, points: &[SkyCoord]) -> Self {
        let mut lo = 0.0f64;
        let mut hi = 0.0f64;
        let mut dec_min = center.dec;
        let mut dec_max = center.dec;
        for p in points {
            let d = ra_difference(p.ra, center.ra);
            lo = lo.min(d);
            hi = hi.max(d);
            dec_min = dec_min.min(p.dec);
            dec_max = dec_max.max(p.dec);
        }
        let ra = if hi - lo >= 359.999 {
            RaRange::full()
        } else {
            RaRange::from_bounds(center.ra + lo, center.ra + hi)
        };
        Self::new(ra, dec_min, dec_max)
    }

    /// Extend to a pole, which also makes every RA part of the window.
    pub fn include_pole(&mut self, north: bool) {
        self.ra = RaRange::full();
        if north {
            self.dec_max = 90.0;
        } else {
            self.dec_min = -90.0;
        }
    }

    pub fn intersects(&self, other: &SkyWindow) -> bool {
        self.dec_min <= other.dec_max && other.dec_min <= self.dec_max && self.ra.intersects(&other.ra)
    }

    pub fn contains(&self, coord: &SkyCoord) -> bool {
        coord.dec >= self.dec_min && coord.dec <= self.dec_max && self.ra.contains(coord.ra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angular_distance_simple() {
        let a = SkyCoord::new(10.0, 0.0);
        let b = SkyCoord::new(11.0, 0.0);
        assert!((angular_distance(&a, &b) - 1.0).abs() < 1e-9);

        let pole = SkyCoord::new(123.0, 90.0);
        let equator = SkyCoord::new(0.0, 0.0);
        assert!((angular_distance(&pole, &equator) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_angular_distance_across_seam() {
        let a = SkyCoord::new(359.5, 0.0);
        let b = SkyCoord::new(0.5, 0.0);
        assert!((angular_distance(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ra_range_wrapping() {
        let r = RaRange::from_bounds(350.0, 10.0);
        assert!((r.span - 20.0).abs() < 1e-12);
        assert!(r.contains(355.0));
        assert!(r.contains(5.0));
        assert!(!r.contains(180.0));
    }

    #[test]
    fn test_ra_range_intersection() {
        let a = RaRange::from_bounds(10.0, 11.0);
        let b = RaRange::from_bounds(10.2, 10.8);
        let c = RaRange::from_bounds(50.0, 51.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));

        let seam = RaRange::from_bounds(359.0, 1.0);
        assert!(seam.intersects(&RaRange::from_bounds(0.5, 2.0)));
        assert!(!seam.intersects(&RaRange::from_bounds(2.0, 3.0)));
    }

    #[test]
    fn test_window_enclosing_across_seam() {
        let center = SkyCoord::new(0.0, 0.0);
        let points = [
            SkyCoord::new(359.0, -1.0),
            SkyCoord::new(1.0, 1.0),
        ];
        let w = SkyWindow::enclosing(&center, &points);
        assert!(w.contains(&SkyCoord::new(0.5, 0.0)));
        assert!(w.contains(&SkyCoord::new(359.5, 0.0)));
        assert!(!w.contains(&SkyCoord::new(180.0, 0.0)));
        assert!((w.ra.span - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_full_circle() {
        let center = SkyCoord::new(180.0, 0.0);
        let points = [SkyCoord::new(0.0001, 10.0), SkyCoord::new(359.9999, -10.0)];
        let w = SkyWindow::enclosing(&center, &points);
        assert!(w.ra.is_full());
    }

    #[test]
    fn test_unit_vector_norm() {
        let v = SkyCoord::new(37.0, -12.5).unit_vector();
        let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
    }
}

//! Interpolation methods for sampling source rasters.

use crate::raster::Raster;
use serde::{Deserialize, Serialize};

/// How a source raster is sampled at fractional pixel positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Value of the nearest pixel; preserves flux exactly per sample.
    #[default]
    Nearest,
    /// Weighted mean of the four surrounding pixels.
    Bilinear,
}

impl Interpolation {
    pub fn sample(self, raster: &Raster, x: f64, y: f64) -> f32 {
        match self {
            Interpolation::Nearest => nearest_interpolate(raster, x, y),
            Interpolation::Bilinear => bilinear_interpolate(raster, x, y),
        }
    }
}

/// Nearest neighbor interpolation.
///
/// Returns the value of the nearest pixel, or NaN off the raster.
pub fn nearest_interpolate(raster: &Raster, x: f64, y: f64) -> f32 {
    let col = x.round();
    let row = y.round();

    if col < 0.0 || row < 0.0 || col >= raster.width as f64 || row >= raster.height as f64 {
        return f32::NAN;
    }

    raster.get(col as usize, row as usize)
}

/// Bilinear interpolation.
///
/// Smoothly interpolates between the four nearest pixels. Positions within
/// half a pixel of the border clamp to the edge row or column.
pub fn bilinear_interpolate(raster: &Raster, x: f64, y: f64) -> f32 {
    let (width, height) = (raster.width, raster.height);
    if raster.is_empty() || x < -0.5 || y < -0.5 || x > width as f64 - 0.5 || y > height as f64 - 0.5 {
        return f32::NAN;
    }

    let x = x.clamp(0.0, (width - 1) as f64);
    let y = y.clamp(0.0, (height - 1) as f64);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = (x - x0 as f64) as f32;
    let yf = (y - y0 as f64) as f32;

    let v00 = raster.get(x0, y0);
    let v10 = raster.get(x1, y0);
    let v01 = raster.get(x0, y1);
    let v11 = raster.get(x1, y1);

    // Handle NaN values - if any corner is NaN, return NaN
    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return f32::NAN;
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Raster {
        Raster::new(vec![0.0, 10.0, 20.0, 30.0], 2, 2)
    }

    #[test]
    fn test_nearest() {
        let r = grid();
        assert_eq!(nearest_interpolate(&r, 0.4, 0.4), 0.0);
        assert_eq!(nearest_interpolate(&r, 0.6, 0.4), 10.0);
        assert!(nearest_interpolate(&r, 2.0, 0.0).is_nan());
        assert!(nearest_interpolate(&r, -0.6, 0.0).is_nan());
    }

    #[test]
    fn test_bilinear_center() {
        let r = grid();
        assert!((bilinear_interpolate(&r, 0.5, 0.5) - 15.0).abs() < 1e-6);
        assert!((bilinear_interpolate(&r, 1.0, 0.0) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_bilinear_nan_corner() {
        let r = Raster::new(vec![0.0, f32::NAN, 20.0, 30.0], 2, 2);
        assert!(bilinear_interpolate(&r, 0.5, 0.5).is_nan());
    }
}

//! Downsampling functions for generating scale-pyramid levels.
//!
//! One pyramid step is: crop to even dimensions, Gaussian smooth (sigma 1,
//! reflected edges, kernel truncated at 4 sigma), then average 2x2 blocks.

use crate::raster::Raster;
use rayon::prelude::*;

/// Width of the smoothing kernel applied before binning.
pub const SMOOTHING_SIGMA: f64 = 1.0;

/// Kernel extent in standard deviations.
const TRUNCATE: f64 = 4.0;

/// Drop the last row and/or column so both dimensions are even.
pub fn crop_even(raster: &Raster) -> Raster {
    let (w, h) = (raster.width & !1, raster.height & !1);
    if (w, h) == (raster.width, raster.height) {
        raster.clone()
    } else {
        raster.crop(0, 0, w, h)
    }
}

/// Normalized 1-D Gaussian kernel, radius `round(TRUNCATE * sigma)`.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as i64;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|i| (-0.5 * (i as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Mirror an index into `[0, n)`, repeating the edge sample: `d c b a | a b c d | d c b a`.
#[inline]
fn reflect(i: i64, n: usize) -> usize {
    let n = n as i64;
    let m = i.rem_euclid(2 * n);
    (if m < n { m } else { 2 * n - 1 - m }) as usize
}

/// Separable Gaussian smoothing with reflected boundaries.
pub fn gaussian_smooth(raster: &Raster, sigma: f64) -> Raster {
    let (w, h) = (raster.width, raster.height);
    if raster.is_empty() {
        return raster.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as i64;

    // Horizontal pass
    let mut tmp = vec![0.0f32; w * h];
    tmp.par_chunks_mut(w)
        .zip(raster.data.par_chunks(w))
        .for_each(|(out, row)| {
            for (x, o) in out.iter_mut().enumerate() {
                let mut acc = 0.0f64;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = reflect(x as i64 + k as i64 - radius, w);
                    acc += weight * row[sx] as f64;
                }
                *o = acc as f32;
            }
        });

    // Vertical pass
    let mut out = vec![0.0f32; w * h];
    out.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, o) in row.iter_mut().enumerate() {
            let mut acc = 0.0f64;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = reflect(y as i64 + k as i64 - radius, h);
                acc += weight * tmp[sy * w + x] as f64;
            }
            *o = acc as f32;
        }
    });

    Raster::new(out, w, h)
}

/// Downsample a raster by a factor of 2 using 2x2 block means.
///
/// Produces a `(width/2, height/2)` raster, rounded down for odd dimensions.
pub fn downsample_2x(raster: &Raster) -> Raster {
    let new_width = raster.width / 2;
    let new_height = raster.height / 2;

    if new_width == 0 || new_height == 0 {
        return Raster::new(vec![], 0, 0);
    }

    let width = raster.width;
    let data = &raster.data;
    let mut output = vec![f32::NAN; new_width * new_height];

    output
        .par_chunks_mut(new_width)
        .enumerate()
        .for_each(|(out_y, row)| {
            let in_y = out_y * 2;
            for (out_x, o) in row.iter_mut().enumerate() {
                let in_x = out_x * 2;
                let v00 = data[in_y * width + in_x];
                let v10 = data[in_y * width + in_x + 1];
                let v01 = data[(in_y + 1) * width + in_x];
                let v11 = data[(in_y + 1) * width + in_x + 1];
                *o = mean_of_block(v00, v10, v01, v11);
            }
        });

    Raster::new(output, new_width, new_height)
}

/// Calculate mean of a 2x2 block, handling NaN values.
///
/// If all values are NaN, returns NaN.
/// Otherwise, returns the mean of valid (non-NaN) values.
#[inline]
fn mean_of_block(v00: f32, v10: f32, v01: f32, v11: f32) -> f32 {
    let values = [v00, v10, v01, v11];
    let mut sum = 0.0f32;
    let mut count = 0;

    for &v in &values {
        if !v.is_nan() {
            sum += v;
            count += 1;
        }
    }

    if count == 0 {
        f32::NAN
    } else {
        sum / count as f32
    }
}

/// One pyramid step: crop even, smooth, bin 2x2.
pub fn downsample_level(raster: &Raster) -> Raster {
    let even = crop_even(raster);
    downsample_2x(&gaussian_smooth(&even, SMOOTHING_SIGMA))
}

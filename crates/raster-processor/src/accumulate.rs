//! Band accumulation: reprojecting source rasters into a tile grid.
//!
//! For each source the tile border is mapped into source pixel space to find
//! the smallest sub-window worth reading. Every tile pixel is then traced
//! through the sky to the sub-window, and the resulting (output, source)
//! pixel pairs add the source samples into a per-band running sum and
//! coverage count.

use crate::interpolation::Interpolation;
use crate::raster::Raster;
use projection::{boundary_points, SkyProjection, TanWcs};
use rayon::prelude::*;
use sky_common::{SkyError, SkyResult};

/// One output pixel and the source position that feeds it.
///
/// Source coordinates are 0-based and relative to the sub-window the
/// source projection describes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub out_x: u32,
    pub out_y: u32,
    pub src_x: f64,
    pub src_y: f64,
}

/// A clipped rectangle of a source raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceWindow {
    pub x0: usize,
    pub y0: usize,
    pub width: usize,
    pub height: usize,
}

/// Tuning for a single accumulation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccumulateParams {
    /// Extra source pixels kept around the projected tile border.
    pub margin: usize,
    /// Samples per tile edge when estimating the source window.
    pub edge_samples: usize,
    pub interpolation: Interpolation,
}

impl Default for AccumulateParams {
    fn default() -> Self {
        Self {
            margin: 10,
            edge_samples: 3,
            interpolation: Interpolation::Nearest,
        }
    }
}

// ============================================================================
// Per-source outcomes
// ============================================================================

/// Why a source added nothing to a band.
#[derive(Debug)]
pub enum SkipReason {
    /// The source does not reach the tile. Not a failure.
    NoOverlap,
    /// The footprint lists no data for this band. Not a failure.
    MissingBand,
    /// The source should have contributed but could not be used.
    Failed(SkyError),
}

impl SkipReason {
    /// Failures make a tile ineligible for the permanent cache.
    pub fn is_failure(&self) -> bool {
        matches!(self, SkipReason::Failed(_))
    }
}

/// Result of offering one source to a band accumulator.
#[derive(Debug)]
pub enum SourceOutcome {
    Contributed { pixels: usize },
    Skipped(SkipReason),
}

impl SourceOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SourceOutcome::Skipped(reason) if reason.is_failure())
    }

    pub fn contributed(&self) -> bool {
        matches!(self, SourceOutcome::Contributed { .. })
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Bounding window of `source` pixels that a tile touches.
///
/// Returns `Ok(None)` when no sampled tile point reaches the source or the
/// clipped window is empty. Tile points that fall behind the source's
/// projection make the whole source the window. A non-finite projected
/// coordinate is an `OverlapComputationFailure`.
pub fn source_window<T, S>(tile: &T, source: &S, edge_samples: usize, margin: usize) -> SkyResult<Option<SourceWindow>>
where
    T: SkyProjection,
    S: SkyProjection,
{
    let (sw, sh) = (source.width(), source.height());
    if sw == 0 || sh == 0 {
        return Ok(None);
    }

    let mut projected = Vec::new();
    let mut unreachable = 0usize;
    for (x, y) in boundary_points(tile.width(), tile.height(), edge_samples) {
        match tile.pixel_to_radec(x, y).and_then(|c| source.radec_to_pixel(&c)) {
            Some(p) => projected.push(p),
            None => unreachable += 1,
        }
    }

    if projected.is_empty() {
        return Ok(None);
    }
    if projected.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(SkyError::OverlapComputationFailure(
            "tile border projected to a non-finite source pixel".to_string(),
        ));
    }
    if unreachable > 0 {
        return Ok(Some(SourceWindow {
            x0: 0,
            y0: 0,
            width: sw,
            height: sh,
        }));
    }

    let (mut xmin, mut xmax) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut ymin, mut ymax) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(x, y) in &projected {
        xmin = xmin.min(x);
        xmax = xmax.max(x);
        ymin = ymin.min(y);
        ymax = ymax.max(y);
    }

    let m = margin as f64;
    let clip = |v: f64, n: usize| v.clamp(0.0, n as f64) as usize;
    let x0 = clip(xmin.floor() - m, sw);
    let x1 = clip(xmax.floor() + 1.0 + m, sw);
    let y0 = clip(ymin.floor() - m, sh);
    let y1 = clip(ymax.floor() + 1.0 + m, sh);

    if x0 >= x1 || y0 >= y1 {
        return Ok(None);
    }
    Ok(Some(SourceWindow {
        x0,
        y0,
        width: x1 - x0,
        height: y1 - y0,
    }))
}

/// Trace every tile pixel into `source` and keep the ones that land on it.
///
/// Rows are processed in parallel; the result is in row-major tile order.
pub fn correspondences<T, S>(tile: &T, source: &S) -> Vec<Correspondence>
where
    T: SkyProjection + Sync,
    S: SkyProjection + Sync,
{
    let (w, h) = (tile.width(), tile.height());
    (0..h)
        .into_par_iter()
        .flat_map_iter(|y| {
            (0..w).filter_map(move |x| {
                let coord = tile.pixel_to_radec(x as f64, y as f64)?;
                let (sx, sy) = source.radec_to_pixel(&coord)?;
                source.contains_pixel(sx, sy).then_some(Correspondence {
                    out_x: x as u32,
                    out_y: y as u32,
                    src_x: sx,
                    src_y: sy,
                })
            })
        })
        .collect()
}

// ============================================================================
// Accumulation
// ============================================================================

/// Running per-pixel sum and coverage count for one band of one tile.
#[derive(Debug, Clone)]
pub struct BandAccumulator {
    width: usize,
    height: usize,
    sum: Vec<f32>,
    count: Vec<u16>,
}

impl BandAccumulator {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            sum: vec![0.0; width * height],
            count: vec![0; width * height],
        }
    }

    /// Add sampled source values; returns how many pixels gained coverage.
    ///
    /// Non-finite samples are skipped, never added as zero.
    pub fn add(&mut self, pairs: &[Correspondence], raster: &Raster, interpolation: Interpolation) -> usize {
        let mut added = 0;
        for c in pairs {
            let v = interpolation.sample(raster, c.src_x, c.src_y);
            if !v.is_finite() {
                continue;
            }
            let idx = c.out_y as usize * self.width + c.out_x as usize;
            self.sum[idx] += v;
            self.count[idx] = self.count[idx].saturating_add(1);
            added += 1;
        }
        added
    }

    /// Average overlapping contributions: `sum / max(count, 1)`.
    pub fn finish(self) -> BandImage {
        let values = self
            .sum
            .iter()
            .zip(&self.count)
            .map(|(s, &n)| s / n.max(1) as f32)
            .collect();
        BandImage {
            values,
            coverage: self.count,
            width: self.width,
            height: self.height,
        }
    }
}

/// An accumulated band: averaged values plus the per-pixel source count.
#[derive(Debug, Clone, PartialEq)]
pub struct BandImage {
    pub values: Vec<f32>,
    pub coverage: Vec<u16>,
    pub width: usize,
    pub height: usize,
}

impl BandImage {
    /// A band with no coverage anywhere.
    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            values: vec![0.0; width * height],
            coverage: vec![0; width * height],
            width,
            height,
        }
    }

    pub fn has_data(&self) -> bool {
        self.coverage.iter().any(|&n| n > 0)
    }

    pub fn into_raster(self) -> Raster {
        Raster::new(self.values, self.width, self.height)
    }
}

/// Offer one TAN-projected source to `acc`.
///
/// `read` loads the pixels of the computed window; its errors, a window of
/// the wrong size, and geometry failures all become `Failed` skips so the
/// caller can carry on with the next source.
pub fn accumulate_source<T, F>(
    acc: &mut BandAccumulator,
    tile: &T,
    source: &TanWcs,
    params: &AccumulateParams,
    read: F,
) -> SourceOutcome
where
    T: SkyProjection + Sync,
    F: FnOnce(&SourceWindow) -> SkyResult<Raster>,
{
    let window = match source_window(tile, source, params.edge_samples, params.margin) {
        Ok(Some(w)) => w,
        Ok(None) => return SourceOutcome::Skipped(SkipReason::NoOverlap),
        Err(e) => return SourceOutcome::Skipped(SkipReason::Failed(e)),
    };

    let raster = match read(&window) {
        Ok(r) => r,
        Err(e) => return SourceOutcome::Skipped(SkipReason::Failed(e)),
    };
    if (raster.width, raster.height) != (window.width, window.height) {
        return SourceOutcome::Skipped(SkipReason::Failed(SkyError::read_failure(
            "source window",
            format!(
                "expected {}x{} pixels, got {}x{}",
                window.width, window.height, raster.width, raster.height
            ),
        )));
    }

    let sub = source.subimage(window.x0, window.y0, window.width, window.height);
    let pairs = correspondences(tile, &sub);
    if pairs.is_empty() {
        return SourceOutcome::Skipped(SkipReason::NoOverlap);
    }

    let pixels = acc.add(&pairs, &raster, params.interpolation);
    SourceOutcome::Contributed { pixels }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sky_common::SkyCoord;

    fn tile() -> TanWcs {
        TanWcs::cutout(&SkyCoord::new(10.5, 0.5), 1.0, 16, 16, false)
    }

    fn source(ra: f64, dec: f64) -> TanWcs {
        TanWcs::cutout(&SkyCoord::new(ra, dec), 0.5, 100, 100, false)
    }

    fn constant(value: f32) -> impl Fn(&SourceWindow) -> SkyResult<Raster> {
        move |w| Ok(Raster::new(vec![value; w.width * w.height], w.width, w.height))
    }

    #[test]
    fn test_window_clipped_with_margin() {
        let w = source_window(&tile(), &source(10.5, 0.5), 3, 10).unwrap().unwrap();
        // 16 px at 1"/px is 32 source px centred on a 100 px source
        assert!(w.x0 > 0 && w.x0 < 34);
        assert!(w.width > 32 && w.width <= 54);
        assert!(w.x0 + w.width <= 100);
    }

    #[test]
    fn test_window_none_when_disjoint() {
        let far = source(11.5, 0.5);
        assert_eq!(source_window(&tile(), &far, 3, 10).unwrap(), None);
    }

    #[test]
    fn test_two_sources_average_not_sum() {
        let t = tile();
        let mut acc = BandAccumulator::new(16, 16);
        let params = AccumulateParams::default();
        for _ in 0..2 {
            let outcome = accumulate_source(&mut acc, &t, &source(10.5, 0.5), &params, constant(7.0));
            assert!(outcome.contributed());
        }
        let band = acc.finish();
        assert!(band.coverage.iter().all(|&n| n == 2));
        assert!(band.values.iter().all(|&v| (v - 7.0).abs() < 1e-6));
    }

    #[test]
    fn test_uncovered_pixels_stay_zero() {
        let t = tile();
        let mut acc = BandAccumulator::new(16, 16);
        // Source edge passes through the middle of the tile
        let half = TanWcs::cutout(&SkyCoord::new(10.5 - 25.0 / 3600.0, 0.5), 0.5, 100, 100, false);
        let outcome = accumulate_source(&mut acc, &t, &half, &AccumulateParams::default(), constant(3.0));
        assert!(outcome.contributed());

        let band = acc.finish();
        let covered = band.coverage.iter().filter(|&&n| n > 0).count();
        assert!(covered > 0 && covered < 256);
        for (v, n) in band.values.iter().zip(&band.coverage) {
            if *n == 0 {
                assert_eq!(*v, 0.0);
            } else {
                assert!((v - 3.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_nan_samples_not_counted() {
        let t = tile();
        let mut acc = BandAccumulator::new(16, 16);
        let outcome = accumulate_source(&mut acc, &t, &source(10.5, 0.5), &AccumulateParams::default(), constant(f32::NAN));
        assert!(matches!(outcome, SourceOutcome::Contributed { pixels: 0 }));
        assert!(!acc.finish().has_data());
    }

    #[test]
    fn test_read_failure_is_recorded_skip() {
        let t = tile();
        let mut acc = BandAccumulator::new(16, 16);
        let outcome = accumulate_source(&mut acc, &t, &source(10.5, 0.5), &AccumulateParams::default(), |_| {
            Err(SkyError::read_failure("x.fits", "truncated"))
        });
        assert!(outcome.is_failure());
        assert!(!SourceOutcome::Skipped(SkipReason::NoOverlap).is_failure());
        assert!(!SourceOutcome::Skipped(SkipReason::MissingBand).is_failure());
    }

    #[test]
    fn test_correspondences_follow_sky() {
        // Identical grids map each pixel onto itself
        let t = tile();
        let pairs = correspondences(&t, &t);
        assert_eq!(pairs.len(), 256);
        for c in pairs {
            assert!((c.src_x - c.out_x as f64).abs() < 1e-6);
            assert!((c.src_y - c.out_y as f64).abs() < 1e-6);
        }
    }
}

//! Sky projections between pixel grids and equatorial coordinates.
//!
//! Every raster in the system (grid tiles, source images, cutouts, all-sky
//! maps) carries a [`SkyProjection`]. Pixel coordinates are 0-based pixel
//! centres: pixel `(0, 0)` covers `[-0.5, 0.5)` in both axes.

pub mod galactic;
pub mod mercator;
pub mod tan;
pub mod wrap;

pub use galactic::{equatorial_to_galactic, galactic_to_equatorial, GalacticZea, Hemisphere};
pub use mercator::{projection_for, MercatorTile};
pub use tan::TanWcs;
pub use wrap::Wrapped;

use sky_common::{angular_distance, SkyCoord, SkyWindow};

/// A mapping between a pixel grid and the celestial sphere.
pub trait SkyProjection {
    /// Sky position of a pixel coordinate, if it has one.
    fn pixel_to_radec(&self, x: f64, y: f64) -> Option<SkyCoord>;

    /// Pixel coordinate of a sky position, if the projection reaches it.
    ///
    /// The result may lie outside the image; callers bounds-check.
    fn radec_to_pixel(&self, coord: &SkyCoord) -> Option<(f64, f64)>;

    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Whether a pixel coordinate falls on the image.
    fn contains_pixel(&self, x: f64, y: f64) -> bool {
        x >= -0.5 && y >= -0.5 && x < self.width() as f64 - 0.5 && y < self.height() as f64 - 0.5
    }
}

impl<T: SkyProjection + ?Sized> SkyProjection for &T {
    fn pixel_to_radec(&self, x: f64, y: f64) -> Option<SkyCoord> {
        (**self).pixel_to_radec(x, y)
    }

    fn radec_to_pixel(&self, coord: &SkyCoord) -> Option<(f64, f64)> {
        (**self).radec_to_pixel(coord)
    }

    fn width(&self) -> usize {
        (**self).width()
    }

    fn height(&self) -> usize {
        (**self).height()
    }
}

/// Points on the border of a `width` x `height` pixel grid.
///
/// Each edge is sampled at `per_edge` evenly spaced positions, corners
/// included once, giving `4 * (per_edge - 1)` points. `per_edge = 3` yields
/// the corners plus edge midpoints.
pub fn boundary_points(width: usize, height: usize, per_edge: usize) -> Vec<(f64, f64)> {
    let per_edge = per_edge.max(2);
    let steps = (per_edge - 1) as f64;
    let (x_max, y_max) = ((width.max(1) - 1) as f64, (height.max(1) - 1) as f64);
    let mut points = Vec::with_capacity(4 * (per_edge - 1));

    for i in 0..per_edge - 1 {
        let t = i as f64 / steps;
        points.push((0.0, t * y_max)); // left, downward
        points.push((t * x_max, y_max)); // bottom, rightward
        points.push((x_max, (1.0 - t) * y_max)); // right, upward
        points.push(((1.0 - t) * x_max, 0.0)); // top, leftward
    }
    points
}

/// The sky region covered by a projected image.
#[derive(Debug, Clone, Copy)]
pub struct SkyFootprint {
    pub center: SkyCoord,
    /// Largest angular distance from `center` to a sampled border point.
    pub radius: f64,
    pub window: SkyWindow,
}

/// Estimate the sky footprint of an image from its border samples.
///
/// Returns `None` when the centre or every border sample fails to project.
/// A celestial pole that projects onto the image widens the window to span
/// all right ascensions.
pub fn sky_footprint<P: SkyProjection>(proj: &P, per_edge: usize) -> Option<SkyFootprint> {
    let (w, h) = (proj.width(), proj.height());
    let center = proj.pixel_to_radec((w as f64 - 1.0) / 2.0, (h as f64 - 1.0) / 2.0)?;

    let corners: Vec<SkyCoord> = boundary_points(w, h, per_edge)
        .into_iter()
        .filter_map(|(x, y)| proj.pixel_to_radec(x, y))
        .collect();
    if corners.is_empty() {
        return None;
    }

    let radius = corners
        .iter()
        .map(|c| angular_distance(&center, c))
        .fold(0.0, f64::max);

    let mut window = SkyWindow::enclosing(&center, &corners);
    for (dec, north) in [(90.0, true), (-90.0, false)] {
        let pole = SkyCoord::new(0.0, dec);
        if let Some((px, py)) = proj.radec_to_pixel(&pole) {
            if proj.contains_pixel(px, py) {
                window.include_pole(north);
            }
        }
    }

    Some(SkyFootprint {
        center,
        radius,
        window,
    })
}

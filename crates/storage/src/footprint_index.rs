//! Spatial index over a catalog's footprints.

use crate::catalog::{Catalog, Footprint};
use crate::kdtree::{chord_for_angle, KdTree};
use sky_common::{SkyCoord, SkyWindow};

/// Footprint centres in a kd-tree, plus the largest footprint half-size.
///
/// A footprint overlaps a region of angular radius `r` only if its centre
/// lies within `r + max_half_size`, so radius queries padded by that margin
/// never miss a candidate.
#[derive(Debug, Clone)]
pub struct FootprintIndex {
    catalog: Catalog,
    tree: KdTree,
    max_half_size: f64,
}

impl FootprintIndex {
    pub fn build(catalog: Catalog) -> Self {
        let points = catalog
            .footprints()
            .iter()
            .map(|fp| fp.center().unit_vector())
            .collect();
        let max_half_size = catalog
            .footprints()
            .iter()
            .map(Footprint::half_size)
            .fold(0.0, f64::max);
        Self {
            tree: KdTree::build(points),
            catalog,
            max_half_size,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Largest centre-to-edge distance of any footprint, in degrees.
    pub fn max_half_size(&self) -> f64 {
        self.max_half_size
    }

    /// All footprints whose centre lies within `radius` degrees of `center`.
    pub fn nearest(&self, center: &SkyCoord, radius: f64) -> Vec<&Footprint> {
        let footprints = self.catalog.footprints();
        self.tree
            .within(center.unit_vector(), chord_for_angle(radius))
            .into_iter()
            .map(|i| &footprints[i])
            .collect()
    }

    /// Footprints overlapping a region.
    ///
    /// Candidates come from a radius query padded by the largest footprint
    /// half-size; each is then kept only if its RA/Dec box intersects
    /// `window`. Results follow catalog order.
    pub fn select(&self, center: &SkyCoord, radius: f64, window: &SkyWindow) -> Vec<&Footprint> {
        let footprints = self.catalog.footprints();
        let mut hits = self
            .tree
            .within(center.unit_vector(), chord_for_angle(radius + self.max_half_size));
        hits.sort_unstable();
        hits.into_iter()
            .map(|i| &footprints[i])
            .filter(|fp| fp.window().intersects(window))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sky_common::RaRange;
    use test_utils::{catalog_json, catalogs, FootprintFixture};

    fn index(fixtures: &[FootprintFixture]) -> FootprintIndex {
        FootprintIndex::build(Catalog::from_json("test", &catalog_json(fixtures)).unwrap())
    }

    fn window(ra1: f64, ra2: f64, dec1: f64, dec2: f64) -> (SkyCoord, f64, SkyWindow) {
        let center = SkyCoord::new((ra1 + ra2) / 2.0, (dec1 + dec2) / 2.0);
        let w = SkyWindow::new(RaRange::from_bounds(ra1, ra2), dec1, dec2);
        let radius = sky_common::angular_distance(&center, &SkyCoord::new(ra1, dec1));
        (center, radius, w)
    }

    #[test]
    fn test_single_brick_scenario() {
        let idx = index(&catalogs::single_brick());

        let (c, r, w) = window(10.2, 10.8, 0.2, 0.8);
        let found = idx.select(&c, r, &w);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "0105p005");

        let (c, r, w) = window(50.0, 51.0, 0.2, 0.8);
        assert!(idx.select(&c, r, &w).is_empty());
    }

    #[test]
    fn test_nearest_uses_centres_only() {
        let idx = index(&catalogs::single_brick());
        // Inside the brick but 0.6 deg from its centre
        let p = SkyCoord::new(10.9, 0.9);
        assert!(idx.nearest(&p, 0.1).is_empty());
        assert_eq!(idx.nearest(&p, 0.6).len(), 1);
        // The padded selection still finds it
        let w = SkyWindow::new(RaRange::from_bounds(10.85, 10.95), 0.85, 0.95);
        assert_eq!(idx.select(&p, 0.1, &w).len(), 1);
    }

    #[test]
    fn test_seam_selection() {
        let idx = index(&catalogs::seam_brick());
        let (c, r, w) = window(0.1, 0.3, -0.1, 0.1);
        assert_eq!(idx.select(&c, r, &w).len(), 1);
        let (c, r, w) = window(359.6, 359.9, -0.1, 0.1);
        assert_eq!(idx.select(&c, r, &w).len(), 1);
    }

    #[test]
    fn test_grid_selection_exact() {
        let idx = index(&catalogs::brick_grid());
        assert_eq!(idx.len(), 16);
        // Covers the interior corner shared by four bricks
        let (c, r, w) = window(20.45, 20.55, -0.55, -0.45);
        assert_eq!(idx.select(&c, r, &w).len(), 4);
        // Entire grid
        let (c, r, w) = window(19.9, 21.1, -1.1, 0.1);
        assert_eq!(idx.select(&c, r, &w).len(), 16);
    }

    #[test]
    fn test_max_half_size() {
        let idx = index(&[
            FootprintFixture::circle("a", 0.0, 0.0, 0.1),
            FootprintFixture::circle("b", 5.0, 0.0, 0.4),
        ]);
        assert!((idx.max_half_size() - 0.4).abs() < 1e-12);
    }
}

//! Tests for sky windows and tile keys.

use sky_common::{RaRange, SkyCoord, SkyWindow, TileKey};

// ============================================================================
// Window construction
// ============================================================================

#[test]
fn test_enclosing_window_simple() {
    let center = SkyCoord::new(10.5, 0.5);
    let points = [
        SkyCoord::new(10.0, 0.0),
        SkyCoord::new(11.0, 0.0),
        SkyCoord::new(11.0, 1.0),
        SkyCoord::new(10.0, 1.0),
    ];
    let w = SkyWindow::enclosing(&center, &points);
    assert!((w.ra.start - 10.0).abs() < 1e-9);
    assert!((w.ra.span - 1.0).abs() < 1e-9);
    assert_eq!((w.dec_min, w.dec_max), (0.0, 1.0));
    assert!(w.contains(&center));
}

#[test]
fn test_enclosing_window_across_seam() {
    let center = SkyCoord::new(0.0, 0.0);
    let points = [SkyCoord::new(359.0, -1.0), SkyCoord::new(1.0, 1.0)];
    let w = SkyWindow::enclosing(&center, &points);
    assert!((w.ra.span - 2.0).abs() < 1e-9);
    assert!(w.contains(&SkyCoord::new(359.5, 0.0)));
    assert!(w.contains(&SkyCoord::new(0.5, 0.0)));
    assert!(!w.contains(&SkyCoord::new(180.0, 0.0)));
}

#[test]
fn test_pole_window_spans_all_ra() {
    let mut w = SkyWindow::new(RaRange::from_bounds(10.0, 20.0), 85.0, 89.0);
    w.include_pole(true);
    assert!(w.ra.is_full());
    assert_eq!(w.dec_max, 90.0);
    assert!(w.contains(&SkyCoord::new(200.0, 88.0)));
}

#[test]
fn test_window_intersection() {
    let brick = SkyWindow::new(RaRange::from_bounds(359.5, 0.5), -0.5, 0.5);
    let tile = SkyWindow::new(RaRange::from_bounds(0.2, 3.0), 0.0, 2.0);
    let far = SkyWindow::new(RaRange::from_bounds(90.0, 91.0), 0.0, 2.0);
    let north = SkyWindow::new(RaRange::from_bounds(0.0, 1.0), 10.0, 11.0);
    assert!(brick.intersects(&tile));
    assert!(!brick.intersects(&far));
    assert!(!brick.intersects(&north));
}

#[test]
fn test_window_clamps_declination() {
    let w = SkyWindow::new(RaRange::full(), -95.0, 100.0);
    assert_eq!((w.dec_min, w.dec_max), (-90.0, 90.0));
}

// ============================================================================
// Keys and paths
// ============================================================================

#[test]
fn test_cache_paths_differ_by_version() {
    let v1 = TileKey::new("ls-dr10", 1, 7, 124, 63).unwrap();
    let v2 = TileKey::new("ls-dr10", 2, 7, 124, 63).unwrap();
    assert_eq!(v1.cache_path("jpg"), "ls-dr10/1/7/124/63.jpg");
    assert_ne!(v1.cache_path("jpg"), v2.cache_path("jpg"));
    assert_eq!(v2.to_string(), "ls-dr10/v2/7/124/63");
}

#[test]
fn test_invalid_key_is_client_error() {
    let err = TileKey::new("ls-dr10", 1, 3, 8, 0).unwrap_err();
    assert_eq!(err.http_status_code(), 400);
    assert_eq!(err.error_code(), "InvalidTileCoordinate");
}

//! Tests for band compositing and JPEG encoding.

use raster_processor::BandImage;
use renderer::{
    blank_jpeg, composite, encode_jpeg, ChannelBand, ChannelParams, ColormapParams, Colormap, CompositeConfig,
    LuminanceParams, RenderError, Stretch,
};

fn band(width: usize, height: usize, value: f32) -> BandImage {
    BandImage {
        values: vec![value; width * height],
        coverage: vec![1; width * height],
        width,
        height,
    }
}

fn rgb_luminance(offset: f32) -> CompositeConfig {
    CompositeConfig::Luminance(LuminanceParams {
        scales: vec![1.0, 1.0, 1.0],
        weights: vec![[0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
        q: 25.0,
        alpha: 1.5,
        offset,
    })
}

// ============================================================================
// Configuration tests
// ============================================================================

#[test]
fn test_config_from_yaml_with_defaults() {
    let yaml = r#"
type: luminance
scales: [1000, 1000]
weights:
  - [0.0, 0.5, 1.0]
  - [1.0, 0.5, 0.0]
"#;
    let config: CompositeConfig = serde_yaml::from_str(yaml).unwrap();
    match &config {
        CompositeConfig::Luminance(p) => {
            assert_eq!(p.q, 25.0);
            assert_eq!(p.alpha, 1.5);
            assert_eq!(p.offset, -0.02);
        }
        other => panic!("expected luminance, got {:?}", other),
    }
    assert_eq!(config.band_count(), 2);
    config.validate().unwrap();
}

#[test]
fn test_colormap_config_from_yaml() {
    let yaml = r#"
type: colormap
stretch: { type: log10, offset: 0.0 }
vmin: -1.0
vmax: 2.0
colormap: hot
"#;
    let config: CompositeConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(
        config,
        CompositeConfig::Colormap(ColormapParams {
            stretch: Stretch::Log10 { offset: 0.0 },
            vmin: -1.0,
            vmax: 2.0,
            colormap: Colormap::Hot,
        })
    );
}

#[test]
fn test_invalid_configs_rejected() {
    let bad_plane = CompositeConfig::Channel(ChannelParams {
        bands: vec![ChannelBand { plane: 3, scale: 1.0 }],
        min: 0.0,
        max: 1.0,
        arcsinh: None,
    });
    assert!(matches!(bad_plane.validate(), Err(RenderError::InvalidConfig(_))));

    let empty_range = CompositeConfig::Colormap(ColormapParams {
        stretch: Stretch::None,
        vmin: 1.0,
        vmax: 1.0,
        colormap: Colormap::Gray,
    });
    assert!(matches!(empty_range.validate(), Err(RenderError::InvalidConfig(_))));

    let ragged = CompositeConfig::Luminance(LuminanceParams {
        scales: vec![1.0, 1.0],
        weights: vec![[1.0, 1.0, 1.0]],
        q: 25.0,
        alpha: 1.5,
        offset: 0.0,
    });
    assert!(matches!(ragged.validate(), Err(RenderError::InvalidConfig(_))));
}

// ============================================================================
// Compositing tests
// ============================================================================

#[test]
fn test_band_count_mismatch() {
    let bands = vec![band(4, 4, 1.0)];
    let err = composite(&bands, &rgb_luminance(0.0)).unwrap_err();
    assert!(matches!(err, RenderError::BandMismatch { expected: 3, got: 1 }));
}

#[test]
fn test_band_size_mismatch() {
    let bands = vec![band(4, 4, 1.0), band(4, 4, 1.0), band(4, 3, 1.0)];
    let err = composite(&bands, &rgb_luminance(0.0)).unwrap_err();
    assert!(matches!(err, RenderError::SizeMismatch { index: 2, .. }));
}

#[test]
fn test_luminance_keeps_color_ratios() {
    // Red band is 3x blue, green 2x blue
    let bands = vec![band(2, 2, 0.02), band(2, 2, 0.04), band(2, 2, 0.06)];
    let img = composite(&bands, &rgb_luminance(0.0)).unwrap();
    let [r, g, b] = img.get_pixel(0, 0).0;

    assert_eq!((r, g, b), (91, 61, 30));
    assert!((g as i32 - 2 * b as i32).abs() <= 1);
}

#[test]
fn test_luminance_saturates_bright_pixels() {
    let bands = vec![band(1, 1, 50.0), band(1, 1, 50.0), band(1, 1, 50.0)];
    let img = composite(&bands, &rgb_luminance(-0.02)).unwrap();
    assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255]);
}

#[test]
fn test_uncovered_pixels_are_black() {
    let mut bands = vec![band(2, 1, 1.0), band(2, 1, 1.0), band(2, 1, 1.0)];
    for b in bands.iter_mut() {
        b.coverage[1] = 0;
        b.values[1] = 0.0;
    }
    let img = composite(&bands, &rgb_luminance(-0.02)).unwrap();
    assert_ne!(img.get_pixel(0, 0).0, [0, 0, 0]);
    assert_eq!(img.get_pixel(1, 0).0, [0, 0, 0]);
}

#[test]
fn test_channel_window_with_arcsinh() {
    let config = CompositeConfig::Channel(ChannelParams {
        bands: vec![
            ChannelBand { plane: 2, scale: 1.0 },
            ChannelBand { plane: 1, scale: 1.0 },
            ChannelBand { plane: 0, scale: 1.0 },
        ],
        min: 0.0,
        max: 25.0,
        arcsinh: Some(1.0),
    });
    let bands = vec![band(1, 1, 0.0), band(1, 1, 25.0), band(1, 1, 100.0)];
    let img = composite(&bands, &config).unwrap();

    // z saturates red, r sits exactly at max, g at min
    assert_eq!(img.get_pixel(0, 0).0, [255, 255, 0]);
}

#[test]
fn test_channel_residual_window_is_symmetric() {
    let config = CompositeConfig::Channel(ChannelParams {
        bands: vec![ChannelBand { plane: 0, scale: 1.0 }],
        min: -5.0,
        max: 5.0,
        arcsinh: None,
    });
    let img = composite(&[band(1, 1, 0.0)], &config).unwrap();
    assert_eq!(img.get_pixel(0, 0).0, [128, 0, 0]);
}

#[test]
fn test_exposure_count_window() {
    // g, r, z counts into blue, green, red over [0, 25] with asinh softening 1
    let config = CompositeConfig::Channel(ChannelParams {
        bands: vec![
            ChannelBand { plane: 2, scale: 1.0 },
            ChannelBand { plane: 1, scale: 1.0 },
            ChannelBand { plane: 0, scale: 1.0 },
        ],
        min: 0.0,
        max: 25.0,
        arcsinh: Some(1.0),
    });
    let bands = vec![band(1, 1, 25.0), band(1, 1, 0.0), band(1, 1, 3.0)];
    let img = composite(&bands, &config).unwrap();
    assert_eq!(img.get_pixel(0, 0).0, [119, 0, 255]);
}

#[test]
fn test_four_band_luminance_weights() {
    // W1 feeds blue; W2 and W3 mix into red and green; W4 is red only
    let config = CompositeConfig::Luminance(LuminanceParams {
        scales: vec![1.0, 1.0, 1.0, 1.0],
        weights: vec![[0.0, 0.0, 1.0], [0.4, 0.8, 0.0], [0.8, 0.2, 0.0], [1.0, 0.0, 0.0]],
        q: 25.0,
        alpha: 1.5,
        offset: -0.02,
    });
    let bands = vec![band(1, 1, 0.1), band(1, 1, 0.05), band(1, 1, 0.02), band(1, 1, 0.01)];
    let img = composite(&bands, &config).unwrap();
    assert_eq!(img.get_pixel(0, 0).0, [75, 73, 136]);

    let w4_only = vec![band(1, 1, 0.0), band(1, 1, 0.0), band(1, 1, 0.0), band(1, 1, 1.0)];
    let [r, g, b] = composite(&w4_only, &config).unwrap().get_pixel(0, 0).0;
    assert!(r == 255 && g < 16 && b < 16, "{:?}", (r, g, b));
}

#[test]
fn test_colormap_log_stretch() {
    let config = CompositeConfig::Colormap(ColormapParams {
        stretch: Stretch::Log10 { offset: 0.0 },
        vmin: 0.0,
        vmax: 2.0,
        colormap: Colormap::Gray,
    });
    let img = composite(&[band(1, 1, 10.0)], &config).unwrap();
    assert_eq!(img.get_pixel(0, 0).0, [128, 128, 128]);
}

// ============================================================================
// JPEG tests
// ============================================================================

#[test]
fn test_encode_jpeg_roundtrip_dimensions() {
    let bands = vec![band(16, 8, 0.5), band(16, 8, 0.5), band(16, 8, 0.5)];
    let img = composite(&bands, &rgb_luminance(0.0)).unwrap();
    let bytes = encode_jpeg(&img, 90).unwrap();

    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (16, 8));
}

#[test]
fn test_blank_jpeg_is_black() {
    let bytes = blank_jpeg(256, 90).unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (256, 256));
    assert!(decoded.pixels().all(|p| p.0.iter().all(|&c| c < 4)));
}

//! Band compositing.
//!
//! Turns accumulated band images into an 8-bit RGB image. Every layer picks
//! one of three configurable modes:
//!
//! - `luminance`: bands are weighted into R, G and B, then a shared asinh
//!   stretch of the mean intensity rescales all three channels together,
//!   keeping color ratios stable across several orders of magnitude.
//! - `channel`: each band feeds one plane with its own scale and an optional
//!   asinh non-linearity, then a fixed [min, max] window. Residual and
//!   exposure-count layers use this with their own windows.
//! - `colormap`: a single scalar band, optionally log-stretched, clamped to
//!   [vmin, vmax] and looked up in a named colormap.
//!
//! Pixels no band covers always render black.

use crate::colormap::Colormap;
use crate::error::{RenderError, Result};
use image::RgbImage;
use raster_processor::BandImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration
// ============================================================================

/// Compositing parameters of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CompositeConfig {
    Luminance(LuminanceParams),
    Channel(ChannelParams),
    Colormap(ColormapParams),
}

/// Shared asinh luminance stretch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuminanceParams {
    /// Per-band divisor applied before weighting.
    pub scales: Vec<f32>,
    /// Per-band contribution to (R, G, B).
    pub weights: Vec<[f32; 3]>,
    #[serde(default = "default_q")]
    pub q: f32,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    /// Subtracted from every channel before the stretch.
    #[serde(default = "default_offset")]
    pub offset: f32,
}

fn default_q() -> f32 {
    25.0
}

fn default_alpha() -> f32 {
    1.5
}

fn default_offset() -> f32 {
    -0.02
}

/// One band of a per-channel composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelBand {
    /// Output plane: 0 = red, 1 = green, 2 = blue.
    pub plane: usize,
    pub scale: f32,
}

/// Per-channel linear or asinh window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelParams {
    pub bands: Vec<ChannelBand>,
    #[serde(default = "default_channel_min")]
    pub min: f32,
    #[serde(default = "default_channel_max")]
    pub max: f32,
    /// Softening of `asinh(x * a) / sqrt(a)`; absent means linear.
    #[serde(default)]
    pub arcsinh: Option<f32>,
}

fn default_channel_min() -> f32 {
    -1.0
}

fn default_channel_max() -> f32 {
    100.0
}

/// Value transform applied before a colormap lookup.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Stretch {
    #[default]
    None,
    Log10 {
        #[serde(default)]
        offset: f32,
    },
}

impl Stretch {
    pub fn apply(self, v: f32) -> f32 {
        match self {
            Stretch::None => v,
            Stretch::Log10 { offset } => (v + offset).log10(),
        }
    }
}

/// Single-band colormap rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColormapParams {
    #[serde(default)]
    pub stretch: Stretch,
    /// Range after the stretch.
    pub vmin: f32,
    pub vmax: f32,
    #[serde(default)]
    pub colormap: Colormap,
}

impl CompositeConfig {
    /// Number of band images this configuration consumes.
    pub fn band_count(&self) -> usize {
        match self {
            CompositeConfig::Luminance(p) => p.scales.len(),
            CompositeConfig::Channel(p) => p.bands.len(),
            CompositeConfig::Colormap(_) => 1,
        }
    }

    /// Check internal consistency; layers call this at load time.
    pub fn validate(&self) -> Result<()> {
        match self {
            CompositeConfig::Luminance(p) => {
                if p.scales.is_empty() || p.scales.len() > 4 {
                    return Err(RenderError::InvalidConfig(format!(
                        "luminance needs 1 to 4 bands, got {}",
                        p.scales.len()
                    )));
                }
                if p.weights.len() != p.scales.len() {
                    return Err(RenderError::InvalidConfig(format!(
                        "{} scales but {} weight rows",
                        p.scales.len(),
                        p.weights.len()
                    )));
                }
                if p.scales.iter().any(|&s| s == 0.0 || !s.is_finite()) {
                    return Err(RenderError::InvalidConfig("band scales must be finite and non-zero".into()));
                }
                if p.q <= 0.0 || p.alpha <= 0.0 {
                    return Err(RenderError::InvalidConfig("q and alpha must be positive".into()));
                }
            }
            CompositeConfig::Channel(p) => {
                if p.bands.is_empty() {
                    return Err(RenderError::InvalidConfig("channel composite has no bands".into()));
                }
                if let Some(b) = p.bands.iter().find(|b| b.plane > 2) {
                    return Err(RenderError::InvalidConfig(format!("plane {} out of range", b.plane)));
                }
                if p.bands.iter().any(|b| b.scale == 0.0 || !b.scale.is_finite()) {
                    return Err(RenderError::InvalidConfig("band scales must be finite and non-zero".into()));
                }
                if let Some(a) = p.arcsinh {
                    if a <= 0.0 {
                        return Err(RenderError::InvalidConfig("arcsinh softening must be positive".into()));
                    }
                }
                let (lo, hi) = p.window();
                if !(hi > lo) {
                    return Err(RenderError::InvalidConfig(format!("empty window [{}, {}]", p.min, p.max)));
                }
            }
            CompositeConfig::Colormap(p) => {
                if !(p.vmax > p.vmin) {
                    return Err(RenderError::InvalidConfig(format!(
                        "empty range [{}, {}]",
                        p.vmin, p.vmax
                    )));
                }
            }
        }
        Ok(())
    }
}

impl ChannelParams {
    fn nonlinear(&self, v: f32) -> f32 {
        match self.arcsinh {
            Some(a) => (v * a).asinh() / a.sqrt(),
            None => v,
        }
    }

    /// The [min, max] window after the non-linearity.
    fn window(&self) -> (f32, f32) {
        (self.nonlinear(self.min), self.nonlinear(self.max))
    }
}

// ============================================================================
// Compositing
// ============================================================================

/// Composite `bands`, given in the configuration's band order.
pub fn composite(bands: &[BandImage], config: &CompositeConfig) -> Result<RgbImage> {
    config.validate()?;
    let expected = config.band_count();
    if bands.len() != expected {
        return Err(RenderError::BandMismatch {
            expected,
            got: bands.len(),
        });
    }
    let (width, height) = (bands[0].width, bands[0].height);
    for (index, b) in bands.iter().enumerate() {
        if (b.width, b.height) != (width, height) {
            return Err(RenderError::SizeMismatch {
                index,
                width,
                height,
                got_width: b.width,
                got_height: b.height,
            });
        }
    }

    let mut pixels = vec![0u8; width * height * 3];
    if width > 0 {
        pixels
            .par_chunks_mut(width * 3)
            .enumerate()
            .for_each(|(y, row)| {
                let mut sample = [0f32; 4];
                for x in 0..width {
                    let idx = y * width + x;
                    if bands.iter().all(|b| b.coverage[idx] == 0) {
                        continue;
                    }
                    for (s, b) in sample.iter_mut().zip(bands) {
                        *s = b.values[idx];
                    }
                    let rgb = match config {
                        CompositeConfig::Luminance(p) => luminance_pixel(p, &sample[..expected]),
                        CompositeConfig::Channel(p) => channel_pixel(p, &sample[..expected]),
                        CompositeConfig::Colormap(p) => colormap_pixel(p, sample[0]),
                    };
                    row[x * 3..x * 3 + 3].copy_from_slice(&rgb);
                }
            });
    }

    RgbImage::from_raw(width as u32, height as u32, pixels)
        .ok_or_else(|| RenderError::Encode("pixel buffer does not match image size".into()))
}

fn to_byte(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn luminance_pixel(p: &LuminanceParams, values: &[f32]) -> [u8; 3] {
    let mut rgb = [0f32; 3];
    for ((v, s), w) in values.iter().zip(&p.scales).zip(&p.weights) {
        let v = if v.is_finite() { v / s } else { 0.0 };
        for c in 0..3 {
            rgb[c] += w[c] * v;
        }
    }
    for c in rgb.iter_mut() {
        *c = (*c - p.offset).max(0.0);
    }

    let mut intensity = (rgb[0] + rgb[1] + rgb[2]) / 3.0;
    if intensity == 0.0 {
        intensity = 1e-6;
    }
    let stretched = (p.alpha * p.q * intensity).asinh() / p.q.sqrt();
    let gain = stretched / intensity;

    [to_byte(rgb[0] * gain), to_byte(rgb[1] * gain), to_byte(rgb[2] * gain)]
}

fn channel_pixel(p: &ChannelParams, values: &[f32]) -> [u8; 3] {
    let (lo, hi) = p.window();
    let mut planes = [0f32; 3];
    let mut fed = [false; 3];
    for (v, band) in values.iter().zip(&p.bands) {
        if v.is_finite() {
            planes[band.plane] += v / band.scale;
        }
        fed[band.plane] = true;
    }

    let mut out = [0u8; 3];
    for c in 0..3 {
        if fed[c] {
            out[c] = to_byte((p.nonlinear(planes[c]) - lo) / (hi - lo));
        }
    }
    out
}

fn colormap_pixel(p: &ColormapParams, value: f32) -> [u8; 3] {
    let v = p.stretch.apply(value);
    if !v.is_finite() {
        return [0, 0, 0];
    }
    let color = p.colormap.color((v - p.vmin) / (p.vmax - p.vmin));
    [color.r, color.g, color.b]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_guard_at_zero_intensity() {
        let p = LuminanceParams {
            scales: vec![1.0],
            weights: vec![[1.0, 1.0, 1.0]],
            q: 25.0,
            alpha: 1.5,
            offset: 0.0,
        };
        assert_eq!(luminance_pixel(&p, &[0.0]), [0, 0, 0]);
    }

    #[test]
    fn test_channel_unfed_plane_stays_dark() {
        let p = ChannelParams {
            bands: vec![ChannelBand { plane: 0, scale: 1.0 }],
            min: 0.0,
            max: 10.0,
            arcsinh: None,
        };
        assert_eq!(channel_pixel(&p, &[5.0]), [128, 0, 0]);
    }

    #[test]
    fn test_log_stretch_of_nonpositive_is_black() {
        let p = ColormapParams {
            stretch: Stretch::Log10 { offset: 0.0 },
            vmin: -1.0,
            vmax: 1.0,
            colormap: Colormap::Gray,
        };
        assert_eq!(colormap_pixel(&p, -3.0), [0, 0, 0]);
        assert_eq!(colormap_pixel(&p, 1.0), [128, 128, 128]);
    }
}

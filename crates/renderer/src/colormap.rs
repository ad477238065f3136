//! Fixed colormaps for single-band scalar layers.

use serde::{Deserialize, Serialize};

/// Color value in RGB format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Linear color interpolation
pub fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;

    Color::new(
        ((color1.r as f32 * t_inv) + (color2.r as f32 * t)).round() as u8,
        ((color1.g as f32 * t_inv) + (color2.g as f32 * t)).round() as u8,
        ((color1.b as f32 * t_inv) + (color2.b as f32 * t)).round() as u8,
    )
}

/// Named colormaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    #[default]
    Gray,
    /// Black through red and yellow to white.
    Hot,
}

// Hot: red saturates first, then green, then blue.
const HOT_STOPS: [(f32, Color); 4] = [
    (0.0, Color::new(10, 0, 0)),
    (0.365, Color::new(255, 0, 0)),
    (0.746, Color::new(255, 255, 0)),
    (1.0, Color::WHITE),
];

impl Colormap {
    /// Color of a normalized value; inputs outside [0, 1] are clamped.
    pub fn color(self, t: f32) -> Color {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            Colormap::Gray => {
                let v = (t * 255.0).round() as u8;
                Color::new(v, v, v)
            }
            Colormap::Hot => {
                for pair in HOT_STOPS.windows(2) {
                    let (t0, c0) = pair[0];
                    let (t1, c1) = pair[1];
                    if t <= t1 {
                        return interpolate_color(c0, c1, (t - t0) / (t1 - t0));
                    }
                }
                Color::WHITE
            }
        }
    }
}

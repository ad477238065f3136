//! Compositing and encoding of sky tiles.
//!
//! Band images produced by the accumulator are turned into displayable RGB
//! through a per-layer [`CompositeConfig`]:
//! - Shared asinh luminance stretch for multi-band color
//! - Per-channel windows for brick, residual and exposure-count layers
//! - Colormaps for single-band scalar maps
//!
//! The result is encoded as JPEG.

pub mod colormap;
pub mod composite;
pub mod error;
pub mod jpeg;

pub use colormap::{interpolate_color, Color, Colormap};
pub use composite::{
    composite, ChannelBand, ChannelParams, ColormapParams, CompositeConfig, LuminanceParams, Stretch,
};
pub use error::{RenderError, Result};
pub use jpeg::{blank_jpeg, encode_jpeg, DEFAULT_JPEG_QUALITY};

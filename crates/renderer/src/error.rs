//! Error types for compositing and encoding.

use sky_common::SkyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// The number of band images does not match the configuration.
    #[error("expected {expected} bands, got {got}")]
    BandMismatch { expected: usize, got: usize },

    /// Band images differ in size.
    #[error("band {index} is {got_width}x{got_height}, expected {width}x{height}")]
    SizeMismatch {
        index: usize,
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },

    #[error("invalid compositing configuration: {0}")]
    InvalidConfig(String),

    #[error("image encoding failed: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for SkyError {
    fn from(err: RenderError) -> Self {
        SkyError::Render(err.to_string())
    }
}

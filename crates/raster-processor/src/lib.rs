//! Source raster access, scale pyramids and band accumulation.
//!
//! This crate turns FITS source imagery into tile-sized band images:
//!
//! - **FITS codec**: header and pixel reading (plain or gzip), sub-window
//!   reads, float32 image and cube writing
//! - **Scale pyramid**: lazily built power-of-two reductions of each source,
//!   persisted next to each other on disk
//! - **Band accumulation**: reprojecting source pixels into a tile grid with
//!   per-pixel coverage counts
//!
//! # Architecture
//!
//! ```text
//! Tile request
//!      │
//!      ▼
//! ScalePyramid::resolve(source, level)
//!      │
//!      ├─► Level cached on disk: return path
//!      │
//!      └─► Resolve level - 1, smooth, bin 2x2, write atomically
//!               │
//!               ▼
//! accumulate_source(acc, tile, wcs, params, read_window)
//!      │
//!      ├─► Project tile border into the source: clipped window
//!      │
//!      ├─► Read only that window
//!      │
//!      └─► Add sampled pixels into (sum, count)
//!               │
//!               ▼
//!          BandAccumulator::finish() -> BandImage
//! ```

pub mod accumulate;
pub mod allsky;
pub mod downsample;
pub mod error;
pub mod fits;
pub mod interpolation;
pub mod pyramid;
pub mod raster;
pub mod reader;
pub mod wcs;

// Re-export commonly used types at crate root
pub use accumulate::{
    accumulate_source, correspondences, source_window, AccumulateParams, BandAccumulator, BandImage,
    Correspondence, SkipReason, SourceOutcome, SourceWindow,
};
pub use allsky::{AllSkyMap, HemisphereMap};
pub use downsample::{downsample_2x, downsample_level, gaussian_smooth};
pub use error::{RasterError, Result};
pub use fits::{FitsHeader, FitsValue};
pub use interpolation::{bilinear_interpolate, nearest_interpolate, Interpolation};
pub use pyramid::{PyramidSource, ScalePyramid};
pub use raster::Raster;
pub use reader::SourceReader;
pub use wcs::{tan_cards, tan_from_header, zea_from_header};

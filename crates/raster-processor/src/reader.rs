//! Instrumented access to source rasters.

use crate::error::Result;
use crate::fits::{self, FitsHeader};
use crate::raster::Raster;
use crate::wcs::tan_from_header;
use projection::TanWcs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Reads FITS sources and counts every file access.
///
/// The count lets callers verify that a request was served without touching
/// source data at all.
#[derive(Debug, Default)]
pub struct SourceReader {
    reads: AtomicU64,
}

impl SourceReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of file reads performed so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    fn record(&self, path: &Path) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        debug!(path = %path.display(), "Reading source raster");
    }

    pub fn header(&self, path: &Path) -> Result<FitsHeader> {
        self.record(path);
        fits::read_header(path)
    }

    /// TAN projection from a file's header.
    pub fn tan_wcs(&self, path: &Path) -> Result<TanWcs> {
        let header = self.header(path)?;
        tan_from_header(&header, &path.display().to_string())
    }

    pub fn image(&self, path: &Path) -> Result<(FitsHeader, Raster)> {
        self.record(path);
        fits::read_image(path)
    }

    pub fn window(&self, path: &Path, x0: usize, y0: usize, w: usize, h: usize) -> Result<Raster> {
        self.record(path);
        fits::read_window(path, x0, y0, w, h).map(|(_, raster)| raster)
    }
}

//! On-disk scale pyramid of downsampled source rasters.
//!
//! Level 0 is the native source file. Level `L > 0` is built from level
//! `L - 1` on first request and persisted at
//! `{root}/{namespace}/{L}{band}/{shard}/{id}-{band}.fits`, where `shard` is
//! the first three characters of the source id. Levels depend only on the
//! source pixels, so an existing file is always reused.

use crate::downsample::downsample_level;
use crate::fits;
use crate::reader::SourceReader;
use crate::wcs::{tan_cards, tan_from_header};
use sky_common::{SkyError, SkyResult};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Identifies one band of one source for pyramid lookups.
#[derive(Debug, Clone, Copy)]
pub struct PyramidSource<'a> {
    /// Directory under the pyramid root; separates layers and image kinds.
    pub namespace: &'a str,
    pub id: &'a str,
    pub band: &'a str,
    /// Native (level 0) file.
    pub native: &'a Path,
}

/// Lazily built, content-addressed cache of downsampled rasters.
#[derive(Debug, Clone)]
pub struct ScalePyramid {
    root: PathBuf,
    reader: Arc<SourceReader>,
}

impl ScalePyramid {
    pub fn new(root: impl Into<PathBuf>, reader: Arc<SourceReader>) -> Self {
        Self {
            root: root.into(),
            reader,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic location of a level `>= 1`.
    pub fn scaled_path(&self, src: &PyramidSource<'_>, level: u32) -> PathBuf {
        let shard: String = src.id.chars().take(3).collect();
        self.root
            .join(src.namespace)
            .join(format!("{}{}", level, src.band))
            .join(shard)
            .join(format!("{}-{}.fits", src.id, src.band))
    }

    /// Path to the raster for `src` at `level`, building missing levels.
    ///
    /// Level 0 fails with `SourceMissing` when the native file is absent.
    /// Higher levels fail with `NotAvailable` when the level below cannot be
    /// produced. Read errors of an existing level propagate unchanged.
    pub fn resolve(&self, src: &PyramidSource<'_>, level: u32) -> SkyResult<PathBuf> {
        if level == 0 {
            return if src.native.exists() {
                Ok(src.native.to_path_buf())
            } else {
                Err(SkyError::SourceMissing(src.native.display().to_string()))
            };
        }

        let target = self.scaled_path(src, level);
        if target.exists() {
            debug!(path = %target.display(), level, "Scale level cached");
            return Ok(target);
        }

        let previous = match self.resolve(src, level - 1) {
            Ok(p) => p,
            Err(SkyError::SourceMissing(_)) | Err(SkyError::NotAvailable { .. }) => {
                return Err(SkyError::NotAvailable {
                    source_id: format!("{}-{}", src.id, src.band),
                    level,
                })
            }
            Err(e) => return Err(e),
        };

        self.build_level(src, level, &previous, &target)?;
        Ok(target)
    }

    fn build_level(&self, src: &PyramidSource<'_>, level: u32, previous: &Path, target: &Path) -> SkyResult<()> {
        let start = Instant::now();
        let (header, raster) = self.reader.image(previous)?;
        let wcs = tan_from_header(&header, &previous.display().to_string())?;

        let reduced = downsample_level(&raster);
        if reduced.is_empty() {
            return Err(SkyError::NotAvailable {
                source_id: format!("{}-{}", src.id, src.band),
                level,
            });
        }
        let reduced_wcs = wcs
            .subimage(0, 0, raster.width & !1, raster.height & !1)
            .scale(0.5);

        let mut cards = tan_cards(&reduced_wcs);
        cards.set("PYRLEVEL", level as i64);
        write_atomic(target, |out| fits::write_image(out, &cards, &reduced))?;

        info!(
            source = src.id,
            band = src.band,
            level,
            width = reduced.width,
            height = reduced.height,
            elapsed_ms = start.elapsed().as_millis() as u64,
            path = %target.display(),
            "Wrote scale level"
        );
        Ok(())
    }
}

/// Write a file in full under a scratch name, then rename it into place.
///
/// The scratch file lives in the target directory so the rename is atomic,
/// and is removed if writing fails.
fn write_atomic<F>(target: &Path, write: F) -> SkyResult<()>
where
    F: FnOnce(&mut BufWriter<&mut fs::File>) -> std::io::Result<()>,
{
    let dir = target
        .parent()
        .ok_or_else(|| SkyError::Storage(format!("no parent directory for {}", target.display())))?;
    fs::create_dir_all(dir)?;

    let mut scratch = tempfile::Builder::new()
        .prefix(".scaled-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    {
        let mut out = BufWriter::new(scratch.as_file_mut());
        write(&mut out)?;
        out.flush()?;
    }
    scratch
        .persist(target)
        .map_err(|e| SkyError::Storage(format!("failed to persist {}: {}", target.display(), e.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Raster;
    use projection::{SkyProjection, TanWcs};
    use sky_common::SkyCoord;
    use test_utils::{create_star_field, temp_data_dir};

    fn write_native(path: &Path, width: usize, height: usize) {
        let wcs = TanWcs::cutout(&SkyCoord::new(10.5, 0.5), 0.262, width, height, false);
        let data = create_star_field(width, height, 1.0, &[(20.0, 12.0, 50.0)], 1.5);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = fs::File::create(path).unwrap();
        fits::write_image(file, &tan_cards(&wcs), &Raster::new(data, width, height)).unwrap();
    }

    fn pyramid(root: &Path) -> (ScalePyramid, Arc<SourceReader>) {
        let reader = Arc::new(SourceReader::new());
        (ScalePyramid::new(root.join("scaled"), reader.clone()), reader)
    }

    #[test]
    fn test_scaled_path_layout() {
        let (p, _) = pyramid(Path::new("/data"));
        let native = PathBuf::from("/data/coadd/010/0105p005/image-g.fits");
        let src = PyramidSource {
            namespace: "ls-dr10",
            id: "0105p005",
            band: "g",
            native: &native,
        };
        assert_eq!(
            p.scaled_path(&src, 3),
            PathBuf::from("/data/scaled/ls-dr10/3g/010/0105p005-g.fits")
        );
    }

    #[test]
    fn test_level_zero_is_native() {
        let dir = temp_data_dir();
        let native = dir.path().join("coadd/b1-g.fits");
        write_native(&native, 40, 30);
        let (p, reader) = pyramid(dir.path());
        let src = PyramidSource {
            namespace: "ns",
            id: "b1",
            band: "g",
            native: &native,
        };
        assert_eq!(p.resolve(&src, 0).unwrap(), native);
        assert_eq!(reader.reads(), 0);
    }

    #[test]
    fn test_dimensions_halve_each_level() {
        let dir = temp_data_dir();
        let native = dir.path().join("coadd/b1-r.fits");
        write_native(&native, 41, 27);
        let (p, _) = pyramid(dir.path());
        let src = PyramidSource {
            namespace: "ns",
            id: "b1",
            band: "r",
            native: &native,
        };

        let (mut w, mut h) = (41usize, 27usize);
        for level in 1..=3 {
            let path = p.resolve(&src, level).unwrap();
            let (header, raster) = fits::read_image(&path).unwrap();
            w /= 2;
            h /= 2;
            assert_eq!((raster.width, raster.height), (w, h), "level {}", level);
            let wcs = tan_from_header(&header, "scaled").unwrap();
            assert!((wcs.pixel_scale() * 3600.0 - 0.262 * (1 << level) as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reduced_wcs_keeps_sky_alignment() {
        let dir = temp_data_dir();
        let native = dir.path().join("coadd/b1-z.fits");
        write_native(&native, 64, 64);
        let (p, _) = pyramid(dir.path());
        let src = PyramidSource {
            namespace: "ns",
            id: "b1",
            band: "z",
            native: &native,
        };
        let header = fits::read_header(&p.resolve(&src, 1).unwrap()).unwrap();
        let reduced = tan_from_header(&header, "scaled").unwrap();
        let full = TanWcs::cutout(&SkyCoord::new(10.5, 0.5), 0.262, 64, 64, false);

        // Pixel (0,0) of level 1 covers native pixels 0..2, centred at 0.5
        let a = reduced.pixel_to_radec(0.0, 0.0).unwrap();
        let b = full.pixel_to_radec(0.5, 0.5).unwrap();
        assert!((a.ra - b.ra).abs() < 1e-9 && (a.dec - b.dec).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let dir = temp_data_dir();
        let native = dir.path().join("coadd/b2-g.fits");
        write_native(&native, 32, 32);
        let (p, reader) = pyramid(dir.path());
        let src = PyramidSource {
            namespace: "ns",
            id: "b2",
            band: "g",
            native: &native,
        };

        let first = p.resolve(&src, 2).unwrap();
        let bytes = fs::read(&first).unwrap();
        let mtime = fs::metadata(&first).unwrap().modified().unwrap();
        let reads = reader.reads();

        let second = p.resolve(&src, 2).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read(&second).unwrap(), bytes);
        assert_eq!(fs::metadata(&second).unwrap().modified().unwrap(), mtime);
        assert_eq!(reader.reads(), reads);
    }

    #[test]
    fn test_missing_native() {
        let dir = temp_data_dir();
        let native = dir.path().join("coadd/none-g.fits");
        let (p, _) = pyramid(dir.path());
        let src = PyramidSource {
            namespace: "ns",
            id: "none",
            band: "g",
            native: &native,
        };
        assert!(matches!(p.resolve(&src, 0), Err(SkyError::SourceMissing(_))));
        assert!(matches!(
            p.resolve(&src, 4),
            Err(SkyError::NotAvailable { level: 4, .. })
        ));
        assert!(!p.scaled_path(&src, 1).exists());
    }

    #[test]
    fn test_too_small_source_not_available() {
        let dir = temp_data_dir();
        let native = dir.path().join("coadd/tiny-g.fits");
        write_native(&native, 3, 3);
        let (p, _) = pyramid(dir.path());
        let src = PyramidSource {
            namespace: "ns",
            id: "tiny",
            band: "g",
            native: &native,
        };
        assert!(p.resolve(&src, 1).is_ok());
        assert!(matches!(p.resolve(&src, 2), Err(SkyError::NotAvailable { .. })));
    }

    #[test]
    fn test_corrupt_level_is_read_failure() {
        let dir = temp_data_dir();
        let native = dir.path().join("coadd/bad-g.fits");
        fs::create_dir_all(native.parent().unwrap()).unwrap();
        fs::write(&native, b"not a fits file").unwrap();
        let (p, _) = pyramid(dir.path());
        let src = PyramidSource {
            namespace: "ns",
            id: "bad",
            band: "g",
            native: &native,
        };
        assert!(matches!(p.resolve(&src, 1), Err(SkyError::SourceReadFailure { .. })));
    }

    #[test]
    fn test_huge_naxis_is_read_failure() {
        let dir = temp_data_dir();
        let native = dir.path().join("coadd/huge-g.fits");
        let mut block = String::new();
        for (key, value) in [("SIMPLE", "T"), ("BITPIX", "8"), ("NAXIS", "2"), ("NAXIS1", "8589934592"), ("NAXIS2", "8589934592")] {
            block.push_str(&format!("{:<80}", format!("{:<8}= {:>20}", key, value)));
        }
        block.push_str(&format!("{:<80}", "END"));
        let mut bytes = block.into_bytes();
        bytes.resize(fits::BLOCK_SIZE, b' ');
        fs::create_dir_all(native.parent().unwrap()).unwrap();
        fs::write(&native, bytes).unwrap();

        let (p, _) = pyramid(dir.path());
        let src = PyramidSource {
            namespace: "ns",
            id: "huge",
            band: "g",
            native: &native,
        };
        assert!(matches!(p.resolve(&src, 1), Err(SkyError::SourceReadFailure { .. })));
        assert!(!p.scaled_path(&src, 1).exists());
    }
}

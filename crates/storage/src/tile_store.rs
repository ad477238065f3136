//! Versioned on-disk tile cache.
//!
//! Tiles live at `{root}/{layer}/{version}/{zoom}/{x}/{y}.{ext}`. Entries are
//! never modified in place: every write goes to a scratch file in the target
//! directory and is renamed over the final path, so readers see either the
//! old file or the new one. A new version number is a disjoint directory,
//! which is the only invalidation mechanism.

use chrono::{DateTime, Utc};
use sky_common::{SkyError, SkyResult, TileKey};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

/// Result of checking the cache for a tile.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Miss,
    /// The caller's copy is current; the body was not read.
    NotModified { last_modified: DateTime<Utc> },
    Hit(CachedTile),
}

/// Metadata of a cached tile file.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedTile {
    pub path: PathBuf,
    pub last_modified: DateTime<Utc>,
    pub len: u64,
}

/// A temporary rendering removed when dropped.
#[derive(Debug)]
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn read(&self) -> SkyResult<Vec<u8>> {
        Ok(fs::read(self.file.path())?)
    }
}

/// The tile cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct TileStore {
    root: PathBuf,
    scratch_dir: PathBuf,
}

impl TileStore {
    pub fn new(root: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic path of a tile.
    pub fn path(&self, key: &TileKey, ext: &str) -> PathBuf {
        self.root.join(key.cache_path(ext))
    }

    /// Check for a cached tile.
    ///
    /// With `if_modified_since`, a file modified less than one second after
    /// that instant yields `NotModified`; HTTP dates carry whole seconds.
    /// Symlinked entries report the metadata of their target, and a dangling
    /// link is a miss.
    pub fn lookup(
        &self,
        key: &TileKey,
        ext: &str,
        if_modified_since: Option<DateTime<Utc>>,
    ) -> SkyResult<CacheLookup> {
        let path = self.path(key, ext);
        let meta = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CacheLookup::Miss),
            Err(e) => return Err(SkyError::Storage(format!("{}: {}", path.display(), e))),
        };
        let last_modified: DateTime<Utc> = meta.modified()?.into();

        if let Some(since) = if_modified_since {
            if last_modified.signed_duration_since(since).num_milliseconds() < 1000 {
                return Ok(CacheLookup::NotModified { last_modified });
            }
        }
        Ok(CacheLookup::Hit(CachedTile {
            path,
            last_modified,
            len: meta.len(),
        }))
    }

    /// Read a cached tile's body.
    pub fn read(&self, tile: &CachedTile) -> SkyResult<Vec<u8>> {
        Ok(fs::read(&tile.path)?)
    }

    /// Atomically write a tile; concurrent writers of one key all succeed
    /// and the last rename wins.
    pub fn persist(&self, key: &TileKey, ext: &str, bytes: &[u8]) -> SkyResult<PathBuf> {
        let target = self.path(key, ext);
        let dir = parent_dir(&target)?;
        fs::create_dir_all(dir)?;

        let mut scratch = tempfile::Builder::new()
            .prefix(".tile-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        scratch.write_all(bytes)?;
        scratch.flush()?;
        scratch
            .persist(&target)
            .map_err(|e| SkyError::Storage(format!("failed to persist {}: {}", target.display(), e.error)))?;

        debug!(tile = %key, path = %target.display(), bytes = bytes.len(), "Persisted tile");
        Ok(target)
    }

    /// Point a tile's cache slot at the shared blank image.
    ///
    /// The link is created under a unique name and renamed into place, which
    /// replaces any existing entry atomically. Link targets are stored as
    /// absolute paths; a relative target would resolve against the link's
    /// own directory.
    pub fn link_blank(&self, key: &TileKey, ext: &str, blank: &Path) -> SkyResult<PathBuf> {
        let blank = fs::canonicalize(blank)
            .map_err(|e| SkyError::Storage(format!("blank tile {}: {}", blank.display(), e)))?;
        let target = self.path(key, ext);
        let dir = parent_dir(&target)?;
        fs::create_dir_all(dir)?;

        let staging = dir.join(format!(".blank-{}.lnk", Uuid::new_v4()));
        make_link(&blank, &staging)?;
        if let Err(e) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }

        debug!(tile = %key, path = %target.display(), "Linked blank tile");
        Ok(target)
    }

    /// Write a rendering that must not enter the cache.
    pub fn scratch(&self, ext: &str, bytes: &[u8]) -> SkyResult<ScratchFile> {
        fs::create_dir_all(&self.scratch_dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("tile-")
            .suffix(&format!(".{}", ext))
            .tempfile_in(&self.scratch_dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(ScratchFile { file })
    }
}

fn parent_dir(path: &Path) -> SkyResult<&Path> {
    path.parent()
        .ok_or_else(|| SkyError::Storage(format!("no parent directory for {}", path.display())))
}

#[cfg(unix)]
fn make_link(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn make_link(target: &Path, link: &Path) -> io::Result<()> {
    fs::copy(target, link).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use test_utils::{temp_data_dir, write_file};

    fn store(root: &Path) -> TileStore {
        TileStore::new(root.join("tiles"), root.join("tmp"))
    }

    fn key(version: u32) -> TileKey {
        TileKey::new("ls-dr10", version, 7, 124, 63).unwrap()
    }

    #[test]
    fn test_layout() {
        let s = store(Path::new("/data"));
        assert_eq!(s.path(&key(1), "jpg"), PathBuf::from("/data/tiles/ls-dr10/1/7/124/63.jpg"));
    }

    #[test]
    fn test_miss_then_hit() {
        let dir = temp_data_dir();
        let s = store(dir.path());
        assert_eq!(s.lookup(&key(1), "jpg", None).unwrap(), CacheLookup::Miss);

        s.persist(&key(1), "jpg", b"jpeg bytes").unwrap();
        match s.lookup(&key(1), "jpg", None).unwrap() {
            CacheLookup::Hit(tile) => {
                assert_eq!(tile.len, 10);
                assert_eq!(s.read(&tile).unwrap(), b"jpeg bytes");
            }
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[test]
    fn test_versions_are_isolated() {
        let dir = temp_data_dir();
        let s = store(dir.path());
        s.persist(&key(1), "jpg", b"v1").unwrap();
        assert_eq!(s.lookup(&key(2), "jpg", None).unwrap(), CacheLookup::Miss);

        s.persist(&key(2), "jpg", b"v2").unwrap();
        fs::remove_file(s.path(&key(2), "jpg")).unwrap();
        assert!(matches!(s.lookup(&key(1), "jpg", None).unwrap(), CacheLookup::Hit(_)));
    }

    #[test]
    fn test_if_modified_since() {
        let dir = temp_data_dir();
        let s = store(dir.path());
        s.persist(&key(1), "jpg", b"x").unwrap();
        let modified = match s.lookup(&key(1), "jpg", None).unwrap() {
            CacheLookup::Hit(t) => t.last_modified,
            other => panic!("expected hit, got {:?}", other),
        };

        // Same second, and later, are current
        let truncated = modified - Duration::nanoseconds(modified.timestamp_subsec_nanos() as i64);
        for since in [truncated, modified, modified + Duration::hours(1)] {
            assert!(matches!(
                s.lookup(&key(1), "jpg", Some(since)).unwrap(),
                CacheLookup::NotModified { .. }
            ));
        }
        // Older copies are refreshed
        assert!(matches!(
            s.lookup(&key(1), "jpg", Some(modified - Duration::seconds(5))).unwrap(),
            CacheLookup::Hit(_)
        ));
    }

    #[test]
    fn test_persist_replaces_and_leaves_no_scratch() {
        let dir = temp_data_dir();
        let s = store(dir.path());
        s.persist(&key(1), "jpg", b"first").unwrap();
        let path = s.persist(&key(1), "jpg", b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");

        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_blank_link_hits_cache() {
        let dir = temp_data_dir();
        let blank = write_file(dir.path(), "static/blank.jpg", b"blank");
        let s = store(dir.path());

        s.link_blank(&key(1), "jpg", &blank).unwrap();
        // Relinking over an existing entry is fine
        s.link_blank(&key(1), "jpg", &blank).unwrap();

        match s.lookup(&key(1), "jpg", None).unwrap() {
            CacheLookup::Hit(tile) => assert_eq!(s.read(&tile).unwrap(), b"blank"),
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_blank_link_target_is_absolute() {
        let dir = temp_data_dir();
        let blank = write_file(dir.path(), "static/blank.jpg", b"blank");
        let s = store(dir.path());
        let link = s
            .link_blank(&key(1), "jpg", &dir.path().join("static/../static/blank.jpg"))
            .unwrap();
        let target = fs::read_link(&link).unwrap();
        assert!(target.is_absolute());
        assert_eq!(target, fs::canonicalize(&blank).unwrap());
    }

    #[test]
    fn test_missing_blank_not_linked() {
        let dir = temp_data_dir();
        let s = store(dir.path());
        let err = s.link_blank(&key(1), "jpg", &dir.path().join("static/blank.jpg"));
        assert!(matches!(err, Err(SkyError::Storage(_))));
        assert_eq!(s.lookup(&key(1), "jpg", None).unwrap(), CacheLookup::Miss);
    }

    #[test]
    fn test_scratch_removed_on_drop() {
        let dir = temp_data_dir();
        let s = store(dir.path());
        let scratch = s.scratch("jpg", b"partial").unwrap();
        let path = scratch.path().to_path_buf();
        assert_eq!(scratch.read().unwrap(), b"partial");
        assert!(path.exists());
        drop(scratch);
        assert!(!path.exists());
        assert_eq!(s.lookup(&key(1), "jpg", None).unwrap(), CacheLookup::Miss);
    }
}

//! Scratch data directories for tests that touch the filesystem.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create an empty data directory that is removed when dropped.
pub fn temp_data_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("sky-tiles-test-")
        .tempdir()
        .expect("failed to create temporary data directory")
}

/// Write `bytes` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create parent directories");
    }
    fs::write(&path, bytes).expect("failed to write test file");
    path
}

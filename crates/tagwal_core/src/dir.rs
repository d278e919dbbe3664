//! Log directory layout.
//!
//! ```text
//! <log_dir>/
//! ├─ 0        # Segment files, named by decimal index
//! ├─ 1
//! ├─ ...
//! └─ tags     # Tag cache (JSON)
//! ```
//!
//! Any entry whose name is not a canonical decimal integer is ignored when
//! scanning for segments, so the tag cache and foreign files never count as
//! segments.

use crate::error::{WalError, WalResult};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// File name of the tag cache within the log directory.
pub const TAGS_FILE: &str = "tags";

/// A log directory on disk.
#[derive(Debug, Clone)]
pub struct LogDir {
    path: PathBuf,
}

impl LogDir {
    /// Wraps an existing directory path without touching the file system.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Opens a log directory, creating it if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the path
    /// exists but is not a directory.
    pub fn create(path: impl Into<PathBuf>) -> WalResult<Self> {
        let path = path.into();
        if !path.exists() {
            fs::create_dir_all(&path)?;
        }
        if !path.is_dir() {
            return Err(WalError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is not a directory: {}", path.display()),
            )));
        }
        Ok(Self { path })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the segment file with the given index.
    #[must_use]
    pub fn segment_path(&self, index: u64) -> PathBuf {
        self.path.join(index.to_string())
    }

    /// Returns the path of the tag cache file.
    #[must_use]
    pub fn tags_path(&self) -> PathBuf {
        self.path.join(TAGS_FILE)
    }

    /// Scans the directory for the lowest and highest segment index present.
    ///
    /// Returns `None` if the directory holds no segment files.
    pub fn segment_range(&self) -> WalResult<Option<(u64, u64)>> {
        let mut range: Option<(u64, u64)> = None;

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let Some(index) = entry.file_name().to_str().and_then(parse_segment_name) else {
                continue;
            };
            range = Some(match range {
                Some((first, last)) => (first.min(index), last.max(index)),
                None => (index, index),
            });
        }

        Ok(range)
    }

    /// Lists the indices of all segment files present, in ascending order.
    pub fn segment_indices(&self) -> WalResult<Vec<u64>> {
        let mut indices = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if let Some(index) = entry.file_name().to_str().and_then(parse_segment_name) {
                indices.push(index);
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }

    /// Deletes a segment file.
    ///
    /// Returns `false` if the file was already gone.
    pub fn remove_segment(&self, index: u64) -> WalResult<bool> {
        match fs::remove_file(self.segment_path(index)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Syncs the directory so that file creations and deletions are durable.
    #[cfg(unix)]
    pub fn sync(&self) -> WalResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    /// Syncs the directory so that file creations and deletions are durable.
    ///
    /// NTFS journals metadata updates; directory handles cannot be synced.
    #[cfg(not(unix))]
    pub fn sync(&self) -> WalResult<()> {
        Ok(())
    }
}

/// Parses a segment file name, accepting only canonical decimal integers.
fn parse_segment_name(name: &str) -> Option<u64> {
    let index: u64 = name.parse().ok()?;
    (index.to_string() == name).then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_makes_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("wal");

        let dir = LogDir::create(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(dir.path(), path);
    }

    #[test]
    fn create_rejects_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("plain");
        File::create(&path).unwrap();

        assert!(LogDir::create(&path).is_err());
    }

    #[test]
    fn empty_range() {
        let temp = tempdir().unwrap();
        let dir = LogDir::create(temp.path()).unwrap();
        assert_eq!(dir.segment_range().unwrap(), None);
    }

    #[test]
    fn range_ignores_non_segments() {
        let temp = tempdir().unwrap();
        let dir = LogDir::create(temp.path()).unwrap();

        for name in ["3", "7", "5", "tags", "007", "+9", "x1"] {
            File::create(temp.path().join(name)).unwrap();
        }

        assert_eq!(dir.segment_range().unwrap(), Some((3, 7)));
        assert_eq!(dir.segment_indices().unwrap(), vec![3, 5, 7]);
    }

    #[test]
    fn remove_missing_segment() {
        let temp = tempdir().unwrap();
        let dir = LogDir::create(temp.path()).unwrap();
        File::create(dir.segment_path(0)).unwrap();

        assert!(dir.remove_segment(0).unwrap());
        assert!(!dir.remove_segment(0).unwrap());
    }

    #[test]
    fn paths_are_correct() {
        let temp = tempdir().unwrap();
        let dir = LogDir::create(temp.path()).unwrap();

        assert_eq!(dir.segment_path(12), temp.path().join("12"));
        assert_eq!(dir.tags_path(), temp.path().join("tags"));
    }
}

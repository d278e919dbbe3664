//! Persisted tag → position index.
//!
//! The cache lives in the `tags` file next to the segments:
//!
//! ```text
//! {"tags":{"commit":{"segment":3,"offset":1024}}}
//! ```
//!
//! It is a best-effort secondary index. Readers validate every hit against
//! the log itself and fall back to scanning when the cache is missing.
//! Writers only rewrite it after the tag record it describes is durable, so
//! the file is either absent, stale-but-safe, or exact.

use crate::error::{WalError, WalResult};
use crate::types::Position;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// In-memory view of the tag cache file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCache {
    tags: BTreeMap<String, Position>,
}

impl TagCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the cache file at `path`.
    ///
    /// Returns `Ok(None)` if the file does not exist or holds nothing yet,
    /// which is the state of a log that has never been tagged.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Io`] if the file cannot be read and
    /// [`WalError::TagCache`] if it cannot be decoded.
    pub fn load(path: &Path) -> WalResult<Option<Self>> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&data)?))
    }

    /// Position recorded for `tag`.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<Position> {
        self.tags.get(tag).copied()
    }

    /// Records `position` for `tag`, replacing any earlier entry.
    pub fn insert(&mut self, tag: impl Into<String>, position: Position) {
        self.tags.insert(tag.into(), position);
    }

    /// Removes entries that point before segment `cutoff`.
    ///
    /// Returns the number of entries removed.
    pub fn remove_before(&mut self, cutoff: u64) -> usize {
        let before = self.tags.len();
        self.tags.retain(|_, pos| pos.segment >= cutoff);
        before - self.tags.len()
    }

    /// Removes entries whose segment lies outside `first..=last`.
    ///
    /// Returns the number of entries removed.
    pub fn remove_outside(&mut self, first: u64, last: u64) -> usize {
        let before = self.tags.len();
        self.tags
            .retain(|_, pos| (first..=last).contains(&pos.segment));
        before - self.tags.len()
    }

    /// Iterates over `(tag, position)` pairs in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Position)> {
        self.tags.iter().map(|(tag, pos)| (tag.as_str(), *pos))
    }

    /// Number of cached tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns `true` if no tags are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// The writer's open handle on the tag cache file.
#[derive(Debug)]
pub(crate) struct TagCacheFile {
    file: File,
    cache: TagCache,
}

impl TagCacheFile {
    /// Opens the cache file, creating it if missing, and loads its contents.
    ///
    /// An undecodable file is discarded; it is rewritten on the next persist.
    pub(crate) fn open(path: &Path) -> WalResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let cache = if data.iter().all(u8::is_ascii_whitespace) {
            TagCache::new()
        } else {
            match serde_json::from_slice(&data) {
                Ok(cache) => cache,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "discarding undecodable tag cache"
                    );
                    TagCache::new()
                }
            }
        };

        Ok(Self { file, cache })
    }

    pub(crate) fn cache(&self) -> &TagCache {
        &self.cache
    }

    pub(crate) fn cache_mut(&mut self) -> &mut TagCache {
        &mut self.cache
    }

    /// Truncates the file, writes the cache, and syncs.
    pub(crate) fn persist(&mut self) -> WalResult<()> {
        let mut data = serde_json::to_vec(&self.cache).map_err(WalError::TagCache)?;
        data.push(b'\n');

        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&data)?;
        self.file.sync_all()?;
        Ok(())
    }
}

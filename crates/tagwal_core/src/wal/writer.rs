//! Multi-segment log writer.

use crate::config::WriteOptions;
use crate::dir::LogDir;
use crate::error::{WalError, WalResult};
use crate::segment::{scan_segment, SegmentWriter, RECORD_OVERHEAD};
use crate::types::Position;
use crate::wal::tags::{TagCache, TagCacheFile};
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

/// Appends records to a directory of numbered segment files.
///
/// All mutating operations run under one lock, so threads sharing a writer
/// observe a single total order of records. Rotation and pruning triggered by
/// a write happen inside the same critical section, before that write's
/// record is appended.
///
/// Only one writer may own a directory at a time; nothing coordinates
/// writers in different processes.
///
/// # Example
///
/// ```no_run
/// use tagwal_core::{LogWriter, WriteOptions};
///
/// # fn main() -> tagwal_core::WalResult<()> {
/// let wal = LogWriter::open_with_options("/var/lib/app/wal", WriteOptions::from_total_size(64 << 20))?;
/// wal.write(b"set x = 1")?;
/// wal.write_tag("commit")?;
/// wal.close()?;
/// # Ok(())
/// # }
/// ```
pub struct LogWriter {
    state: Mutex<WriterState>,
}

struct WriterState {
    dir: LogDir,
    options: WriteOptions,
    /// Oldest retained segment index.
    first: u64,
    /// Current (write-head) segment index.
    index: u64,
    segment: SegmentWriter,
    tags: TagCacheFile,
    closed: bool,
}

impl LogWriter {
    /// Opens a log directory with default options.
    ///
    /// # Errors
    ///
    /// See [`Self::open_with_options`].
    pub fn open(path: impl Into<PathBuf>) -> WalResult<Self> {
        Self::open_with_options(path, WriteOptions::default())
    }

    /// Opens a log directory, creating it if absent.
    ///
    /// The writer resumes in the highest-numbered segment present (segment 0
    /// for a new log). If that segment ends in bytes that cannot be decoded,
    /// e.g. a record torn by a crash, the writer starts a fresh segment
    /// instead of appending after them.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or the directory, current
    /// segment, or tag cache cannot be opened.
    pub fn open_with_options(path: impl Into<PathBuf>, options: WriteOptions) -> WalResult<Self> {
        options.validate()?;
        let dir = LogDir::create(path)?;

        let (first, mut index) = dir.segment_range()?.unwrap_or((0, 0));

        let current = dir.segment_path(index);
        if current.exists() {
            let summary = scan_segment(&current)?;
            if !summary.is_appendable() {
                tracing::warn!(
                    segment = index,
                    readable_len = summary.readable_len,
                    file_len = summary.file_len,
                    error = ?summary.error,
                    "current segment has an unreadable tail, starting a new segment"
                );
                index += 1;
            }
        }

        let segment = open_segment(&dir, index, &options)?;

        let mut tags = TagCacheFile::open(&dir.tags_path())?;
        if tags.cache_mut().remove_outside(first, index) > 0 {
            tags.persist()?;
        }

        tracing::info!(
            path = %dir.path().display(),
            first,
            index,
            offset = segment.position(),
            tags = tags.cache().len(),
            "opened log writer"
        );

        Ok(Self {
            state: Mutex::new(WriterState {
                dir,
                options,
                first,
                index,
                segment,
                tags,
                closed: false,
            }),
        })
    }

    /// Appends a data record.
    ///
    /// If the record would push the current segment past the configured
    /// segment size, the writer first rotates to a new segment and prunes old
    /// ones.
    ///
    /// Returns the position at which the record starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer is closed, rotation or pruning fails,
    /// or the append fails.
    pub fn write(&self, payload: &[u8]) -> WalResult<Position> {
        let mut state = self.state.lock();
        state.ensure_open()?;

        let current = state.segment.size();
        let projected = current + payload.len() as u64 + RECORD_OVERHEAD;
        if projected > state.options.segment_size && current > 0 {
            state.rotate()?;
            let expire_before = state.expire_before();
            let max_segments = state.options.max_segments;
            state.prune(max_segments, expire_before)?;
        }

        let offset = state.segment.append(payload)?;
        Ok(Position::new(state.index, offset))
    }

    /// Appends a tag record named `name` and records it in the tag cache.
    ///
    /// The tag record is synced before the cache file is rewritten, so the
    /// cache never names a tag that is not on disk. The cached position is
    /// where the tag record starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer is closed or the append, sync, or cache
    /// rewrite fails.
    pub fn write_tag(&self, name: &str) -> WalResult<Position> {
        let mut state = self.state.lock();
        state.ensure_open()?;

        let position = Position::new(state.index, state.segment.position());
        state.segment.append_tag(name)?;
        if !state.segment.sync_interval().is_zero() {
            state.segment.sync()?;
        }

        state.tags.cache_mut().insert(name, position);
        state.tags.persist()?;

        tracing::debug!(tag = name, %position, "wrote tag");
        Ok(position)
    }

    /// Position at which the next record will be written.
    #[must_use]
    pub fn position(&self) -> Position {
        let state = self.state.lock();
        Position::new(state.index, state.segment.position())
    }

    /// Closes the current segment and starts the next one.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer is closed or a segment cannot be
    /// closed or created.
    pub fn rotate(&self) -> WalResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.rotate()
    }

    /// Deletes old segments.
    ///
    /// At most `max_segments` segments, counting back from the current one,
    /// survive the count limit. When `expire_before` is given, segments last
    /// modified at or before that time are deleted as well, walking forward
    /// from the count boundary until the first segment still inside the
    /// window. The current segment is never deleted. Tag cache entries that
    /// point into deleted segments are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::InvalidOptions`] if `max_segments` is zero, or an
    /// I/O error from stat'ing or deleting segments.
    pub fn prune(&self, max_segments: usize, expire_before: Option<SystemTime>) -> WalResult<()> {
        if max_segments == 0 {
            return Err(WalError::invalid_options("max_segments must be at least 1"));
        }
        self.state.lock().prune(max_segments, expire_before)
    }

    /// Syncs the current segment immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer is closed or the sync fails.
    pub fn sync(&self) -> WalResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.segment.sync()
    }

    /// Closes the current segment, writing its closing marker.
    ///
    /// Later writes fail with [`WalError::Closed`]. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the closing marker cannot be written.
    pub fn close(&self) -> WalResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.segment.close()?;
        state.closed = true;
        tracing::debug!(path = %state.dir.path().display(), "closed log writer");
        Ok(())
    }

    /// Index of the oldest retained segment.
    #[must_use]
    pub fn first_segment(&self) -> u64 {
        self.state.lock().first
    }

    /// Index of the segment currently being written.
    #[must_use]
    pub fn current_segment(&self) -> u64 {
        self.state.lock().index
    }

    /// Snapshot of the tag cache.
    #[must_use]
    pub fn tags(&self) -> TagCache {
        self.state.lock().tags.cache().clone()
    }

    /// Options the writer was opened with.
    #[must_use]
    pub fn options(&self) -> WriteOptions {
        self.state.lock().options.clone()
    }

    /// Log directory path.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.state.lock().dir.path().to_path_buf()
    }
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LogWriter")
            .field("path", &state.dir.path())
            .field("first", &state.first)
            .field("index", &state.index)
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}

impl WriterState {
    fn ensure_open(&self) -> WalResult<()> {
        if self.closed {
            return Err(WalError::Closed);
        }
        Ok(())
    }

    fn expire_before(&self) -> Option<SystemTime> {
        if self.options.segment_ttl.is_zero() {
            return None;
        }
        SystemTime::now().checked_sub(self.options.segment_ttl)
    }

    fn rotate(&mut self) -> WalResult<()> {
        self.segment.close()?;

        let next = self.index + 1;
        self.segment = open_segment(&self.dir, next, &self.options)?;
        self.index = next;

        tracing::debug!(segment = next, "rotated to new segment");
        Ok(())
    }

    fn prune(&mut self, max_segments: usize, expire_before: Option<SystemTime>) -> WalResult<()> {
        let keep = max_segments as u64;
        let mut cutoff = self.first.max((self.index + 1).saturating_sub(keep));

        if let Some(expire_before) = expire_before {
            while cutoff < self.index {
                match fs::metadata(self.dir.segment_path(cutoff)) {
                    Ok(meta) => {
                        if meta.modified()? > expire_before {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                cutoff += 1;
            }
        }

        if cutoff <= self.first {
            return Ok(());
        }

        let mut removed = 0;
        for index in self.first..cutoff {
            if self.dir.remove_segment(index)? {
                removed += 1;
            }
        }
        if removed > 0 {
            self.dir.sync()?;
        }
        self.first = cutoff;

        let purged = self.tags.cache_mut().remove_before(cutoff);
        if purged > 0 {
            self.tags.persist()?;
        }

        tracing::debug!(first = cutoff, removed, purged_tags = purged, "pruned segments");
        Ok(())
    }
}

fn open_segment(dir: &LogDir, index: u64, options: &WriteOptions) -> WalResult<SegmentWriter> {
    let path = dir.segment_path(index);
    let created = !path.exists();

    let mut segment = SegmentWriter::open(&path)?;
    segment.set_sync_interval(options.sync_interval)?;
    if created {
        dir.sync()?;
    }
    Ok(segment)
}

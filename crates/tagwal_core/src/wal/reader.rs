//! Multi-segment log reader.

use crate::dir::LogDir;
use crate::error::{WalError, WalResult};
use crate::segment::{RecordType, SegmentReader};
use crate::types::Position;
use crate::wal::tags::TagCache;
use std::io;
use std::path::{Path, PathBuf};

/// Cursor over the data records of a log directory.
///
/// The reader chains segment files in index order. When it runs out of
/// records it rescans the directory, so a reader can tail a live
/// [`crate::LogWriter`] across rotations: [`Self::next_record`] returning
/// `false` with no [`Self::error`] means the reader has caught up with the
/// writer, and a later call may find more.
///
/// Corruption stops the reader. Once a checksum or framing error is hit,
/// `next_record` keeps returning `false` and [`Self::error`] reports the
/// cause until the reader is repositioned.
#[derive(Debug)]
pub struct LogReader {
    dir: LogDir,
    /// Lowest segment index seen by the last directory scan.
    first: u64,
    /// Highest segment index known to exist.
    last: u64,
    /// Index of the open segment.
    index: u64,
    segment: Option<SegmentReader>,
    error: Option<WalError>,
}

impl LogReader {
    /// Opens a reader positioned at the first record of the log.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::NoSegments`] if the directory is missing or holds
    /// no segment files.
    pub fn open(path: impl Into<PathBuf>) -> WalResult<Self> {
        let mut reader = Self {
            dir: LogDir::new(path),
            first: 0,
            last: 0,
            index: 0,
            segment: None,
            error: None,
        };
        reader.reset()?;
        Ok(reader)
    }

    /// Rescans the directory and moves back to the start of the oldest
    /// retained segment.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::NoSegments`] if no segment files remain. On
    /// failure the cursor is left where it was.
    pub fn reset(&mut self) -> WalResult<()> {
        let (first, last) = self.scan()?.ok_or(WalError::NoSegments)?;
        self.open_segment(first)?;
        self.first = first;
        self.last = last;
        self.error = None;
        Ok(())
    }

    /// Advances to the next data record, crossing segment boundaries.
    ///
    /// Returns `false` when no further record is available yet or an error
    /// stopped the reader; [`Self::error`] tells the two apart.
    pub fn next_record(&mut self) -> bool {
        self.advance(RecordType::Data)
    }

    fn advance(&mut self, filter: RecordType) -> bool {
        if self.error.is_some() {
            return false;
        }

        loop {
            let Some(segment) = self.segment.as_mut() else {
                self.error = Some(WalError::NoSegments);
                return false;
            };
            if segment.next_record(Some(filter)) {
                return true;
            }
            if let Some(e) = segment.take_error() {
                self.error = Some(e);
                return false;
            }

            if self.index >= self.last {
                match self.scan() {
                    Ok(Some((_, last))) => self.last = self.last.max(last),
                    Ok(None) => return false,
                    Err(e) => {
                        self.error = Some(e);
                        return false;
                    }
                }
                if self.index >= self.last {
                    return false;
                }
            }

            if let Err(e) = self.open_segment(self.index + 1) {
                self.error = Some(e);
                return false;
            }
        }
    }

    /// Payload of the current record; empty if there is none.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        self.segment.as_ref().map(SegmentReader::value).unwrap_or_default()
    }

    /// Checksum of the current record; 0 if there is none.
    #[must_use]
    pub fn checksum(&self) -> u16 {
        self.segment.as_ref().map_or(0, SegmentReader::checksum)
    }

    /// Error that stopped the reader, if any.
    #[must_use]
    pub fn error(&self) -> Option<&WalError> {
        self.error.as_ref()
    }

    /// Removes and returns the error that stopped the reader.
    ///
    /// The reader resumes from where it stopped on the next call to
    /// [`Self::next_record`], which usually hits the same error again.
    pub fn take_error(&mut self) -> Option<WalError> {
        self.error.take()
    }

    /// Position of the next record to be read.
    ///
    /// Returns `None` if the reader is stopped by an error or has no open
    /// segment.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        if self.error.is_some() {
            return None;
        }
        self.segment
            .as_ref()
            .map(|segment| Position::new(self.index, segment.position()))
    }

    /// Position of the record most recently returned by
    /// [`Self::next_record`]; `None` if there is no current record.
    #[must_use]
    pub fn record_position(&self) -> Option<Position> {
        self.segment
            .as_ref()
            .and_then(SegmentReader::record_offset)
            .map(|offset| Position::new(self.index, offset))
    }

    /// Moves the cursor to `position` and clears any error.
    ///
    /// The offset is not validated. Positions should come from
    /// [`crate::LogWriter::position`], [`Self::position`] or the tag cache.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::SegmentVanished`] if the target segment does not
    /// exist. The cursor and any earlier error are then left unchanged.
    pub fn seek(&mut self, position: Position) -> WalResult<()> {
        if self.segment.is_none() || self.index != position.segment {
            self.open_segment(position.segment)?;
            self.last = self.last.max(position.segment);
        }
        self.error = None;
        if let Some(segment) = self.segment.as_mut() {
            segment.seek(position.offset);
        }
        Ok(())
    }

    /// Positions the reader so the next call to [`Self::next_record`]
    /// yields the last data record in the log.
    ///
    /// Segments holding no data records are skipped, walking back from the
    /// newest one.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::NoSegments`] if the log holds no data records, or
    /// the error that stopped the scan.
    pub fn seek_last(&mut self) -> WalResult<()> {
        let (first, last) = self.scan()?.ok_or(WalError::NoSegments)?;
        self.first = first;
        self.last = last;

        for index in (first..=last).rev() {
            self.seek(Position::start_of(index))?;

            let mut before = None;
            let mut cursor = self.position();
            while self.next_record() {
                before = cursor;
                cursor = self.position();
            }
            if let Some(e) = self.error.take() {
                return Err(e);
            }
            if let Some(before) = before {
                return self.seek(before);
            }
        }

        Err(WalError::NoSegments)
    }

    /// Positions the reader immediately after the tag record named `tag`.
    ///
    /// The tag cache is tried first and every hit is checked against the
    /// log. If the cache has no usable entry, tag records are scanned
    /// forward from the current cursor.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::TagNotFound`] if the scan reaches the end of the
    /// log, [`WalError::TagCache`] if the cache file exists but cannot be
    /// decoded, or the error that stopped the scan.
    pub fn seek_tag(&mut self, tag: &str) -> WalResult<()> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let resume = self.position().ok_or(WalError::NoSegments)?;

        if self.seek_cached_tag(tag, resume)? {
            return Ok(());
        }
        self.scan_for_tag(tag)
    }

    /// Tries the tag cache. On a miss the cursor is left at `resume`.
    fn seek_cached_tag(&mut self, tag: &str, resume: Position) -> WalResult<bool> {
        let cache = match TagCache::load(&self.dir.tags_path()) {
            Ok(Some(cache)) => cache,
            Ok(None) => return Ok(false),
            Err(WalError::Io(e)) => {
                tracing::warn!(error = %e, "tag cache unreadable, scanning log");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        let Some(cached) = cache.get(tag) else {
            return Ok(false);
        };

        if self.seek(cached).is_ok()
            && self.advance(RecordType::Tag)
            && self.value() == tag.as_bytes()
        {
            tracing::debug!(tag, %cached, "found tag via cache");
            return Ok(true);
        }

        tracing::debug!(tag, %cached, "stale tag cache entry, scanning log");
        self.seek(resume)?;
        Ok(false)
    }

    fn scan_for_tag(&mut self, tag: &str) -> WalResult<()> {
        while self.advance(RecordType::Tag) {
            if self.value() == tag.as_bytes() {
                return Ok(());
            }
        }
        match self.error.take() {
            Some(e) => Err(e),
            None => Err(WalError::tag_not_found(tag)),
        }
    }

    /// Iterates over the remaining data records.
    ///
    /// The iterator ends when the reader catches up with the writer. An
    /// error that stops the reader is yielded once, after which the
    /// iterator ends.
    pub fn records(&mut self) -> Records<'_> {
        Records {
            reader: self,
            done: false,
        }
    }

    /// Index of the oldest segment seen by the last directory scan.
    #[must_use]
    pub fn first_segment(&self) -> u64 {
        self.first
    }

    /// Index of the newest segment known to the reader.
    #[must_use]
    pub fn last_segment(&self) -> u64 {
        self.last
    }

    /// Log directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Closes the reader, releasing its file handle.
    pub fn close(self) {}

    fn scan(&self) -> WalResult<Option<(u64, u64)>> {
        match self.dir.segment_range() {
            Err(WalError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            other => other,
        }
    }

    /// Swaps in segment `index`. The open segment is kept if this fails.
    fn open_segment(&mut self, index: u64) -> WalResult<()> {
        match SegmentReader::open(self.dir.segment_path(index)) {
            Ok(segment) => {
                self.index = index;
                self.segment = Some(segment);
                Ok(())
            }
            Err(WalError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                Err(WalError::SegmentVanished { segment: index })
            }
            Err(e) => Err(e),
        }
    }
}

/// Iterator returned by [`LogReader::records`].
#[derive(Debug)]
pub struct Records<'a> {
    reader: &'a mut LogReader,
    done: bool,
}

impl Iterator for Records<'_> {
    type Item = WalResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.reader.next_record() {
            return Some(Ok(self.reader.value().to_vec()));
        }
        self.done = true;
        self.reader.take_error().map(Err)
    }
}

//! Append-only writer for one segment file.

use crate::error::{WalError, WalResult};
use crate::segment::record::{self, RecordType, CLOSING_MAGIC};
use crate::segment::sync::PeriodicSync;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Appends framed records to a single segment file.
///
/// The writer tracks the file size itself; the file is only stat'ed once,
/// when it is opened. Reopening a segment that was closed cleanly resumes
/// after its closing marker.
///
/// # Durability
///
/// With a zero sync interval every append is synced before it returns.
/// Otherwise a background thread syncs the file once per interval, so a crash
/// loses at most one interval of writes.
pub struct SegmentWriter {
    path: PathBuf,
    file: File,
    size: u64,
    sync_interval: Duration,
    syncer: Option<PeriodicSync>,
    closed: bool,
}

impl SegmentWriter {
    /// Opens (creating if necessary) a segment for appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or stat'ed.
    pub fn open(path: impl AsRef<Path>) -> WalResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;
        let size = file.metadata()?.len();

        tracing::debug!(path = %path.display(), size, "opened segment for writing");

        Ok(Self {
            path,
            file,
            size,
            sync_interval: Duration::ZERO,
            syncer: None,
            closed: false,
        })
    }

    /// Appends a data record.
    ///
    /// Returns the offset at which the record starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer is closed, the payload is too large, or
    /// an I/O error occurs.
    pub fn append(&mut self, payload: &[u8]) -> WalResult<u64> {
        self.append_record(RecordType::Data, payload)
    }

    /// Appends a tag record whose payload is `name`.
    ///
    /// Returns the offset at which the record starts.
    ///
    /// # Errors
    ///
    /// Same as [`Self::append`].
    pub fn append_tag(&mut self, name: &str) -> WalResult<u64> {
        self.append_record(RecordType::Tag, name.as_bytes())
    }

    fn append_record(&mut self, record_type: RecordType, payload: &[u8]) -> WalResult<u64> {
        if self.closed {
            return Err(WalError::Closed);
        }

        let frame = record::encode(record_type, payload)?;
        let offset = self.size;
        self.file.write_all(&frame)?;
        self.size += frame.len() as u64;

        match &self.syncer {
            Some(syncer) => syncer.mark_dirty(),
            None => self.file.sync_data()?,
        }

        Ok(offset)
    }

    /// Offset at which the next record will be written.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.size
    }

    /// Number of bytes in the segment, including any closing marker.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Path of the segment file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configured sync interval.
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        self.sync_interval
    }

    /// Changes how often the segment is synced.
    ///
    /// A zero interval stops the background thread and syncs every append.
    ///
    /// # Errors
    ///
    /// Returns an error if the file handle cannot be cloned or the sync
    /// thread cannot be spawned.
    pub fn set_sync_interval(&mut self, interval: Duration) -> WalResult<()> {
        if let Some(mut syncer) = self.syncer.take() {
            syncer.stop();
            // Bytes marked dirty for the old thread must not be lost.
            self.file.sync_data()?;
        }

        self.sync_interval = interval;
        if !interval.is_zero() && !self.closed {
            let handle = self.file.try_clone()?;
            self.syncer = Some(PeriodicSync::start(handle, self.path.clone(), interval)?);
        }
        Ok(())
    }

    /// Syncs written bytes to durable storage immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> WalResult<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Returns `true` once [`Self::close`] has succeeded.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Writes the closing marker, syncs, and stops background syncing.
    ///
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker cannot be written or synced.
    pub fn close(&mut self) -> WalResult<()> {
        if self.closed {
            return Ok(());
        }
        if let Some(mut syncer) = self.syncer.take() {
            syncer.stop();
        }

        self.file.write_all(&CLOSING_MAGIC)?;
        self.size += CLOSING_MAGIC.len() as u64;
        self.file.sync_all()?;
        self.closed = true;

        tracing::debug!(path = %self.path.display(), size = self.size, "closed segment");
        Ok(())
    }
}

impl std::fmt::Debug for SegmentWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentWriter")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("sync_interval", &self.sync_interval)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

//! Sequential reader for one segment file.

use crate::error::{WalError, WalResult};
use crate::segment::record::{self, Frame, Record, RecordType};
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Decodes records from a single segment file.
///
/// The reader tolerates a segment that is still being written: when the next
/// record is incomplete, [`Self::next_record`] returns `false` and leaves the
/// cursor where it was, so a later call picks the record up once the writer
/// has flushed it.
///
/// Corruption is different. A checksum or framing failure is kept as a sticky
/// error, available from [`Self::error`], and the reader yields nothing more
/// until it is repositioned with [`Self::seek`].
pub struct SegmentReader {
    path: PathBuf,
    reader: BufReader<File>,
    /// Offset of the next frame.
    offset: u64,
    /// Whether the buffered stream is positioned at `offset`.
    in_sync: bool,
    record: Option<Record>,
    /// Offset of the frame holding `record`.
    record_offset: u64,
    clean_close: bool,
    error: Option<WalError>,
}

impl SegmentReader {
    /// Opens a segment for reading, positioned at offset 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> WalResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            reader: BufReader::new(file),
            offset: 0,
            in_sync: true,
            record: None,
            record_offset: 0,
            clean_close: false,
            error: None,
        })
    }

    /// Advances to the next record whose type matches `filter`.
    ///
    /// `None` matches every record type. Records of other types and closing
    /// markers are skipped.
    ///
    /// Returns `false` when no further complete record is available or a
    /// sticky error is set; check [`Self::error`] to tell the two apart.
    pub fn next_record(&mut self, filter: Option<RecordType>) -> bool {
        self.record = None;
        if self.error.is_some() {
            return false;
        }

        loop {
            if !self.in_sync {
                if let Err(e) = self.reader.seek(SeekFrom::Start(self.offset)) {
                    self.error = Some(e.into());
                    return false;
                }
                self.in_sync = true;
            }

            match record::read_frame(&mut self.reader, self.offset) {
                Ok(None) => {
                    // Partial bytes were consumed from the stream; re-seek next time.
                    self.in_sync = false;
                    return false;
                }
                Ok(Some(frame)) => {
                    let start = self.offset;
                    self.offset += frame.encoded_len();
                    match frame {
                        Frame::Closed => self.clean_close = true,
                        Frame::Record(record) => {
                            self.clean_close = false;
                            if filter.is_none_or(|t| t == record.record_type) {
                                self.record = Some(record);
                                self.record_offset = start;
                                return true;
                            }
                        }
                    }
                }
                Err(e) => {
                    self.in_sync = false;
                    self.error = Some(e);
                    return false;
                }
            }
        }
    }

    /// Payload of the record most recently returned by [`Self::next_record`].
    ///
    /// Empty if the last call returned `false`.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        self.record.as_ref().map(|r| r.payload.as_slice()).unwrap_or_default()
    }

    /// Checksum of the current record (0 if there is none).
    #[must_use]
    pub fn checksum(&self) -> u16 {
        self.record.as_ref().map_or(0, |r| r.checksum)
    }

    /// Type of the current record.
    #[must_use]
    pub fn record_type(&self) -> Option<RecordType> {
        self.record.as_ref().map(|r| r.record_type)
    }

    /// Offset at which the current record starts.
    #[must_use]
    pub fn record_offset(&self) -> Option<u64> {
        self.record.as_ref().map(|_| self.record_offset)
    }

    /// Offset of the next frame to be decoded.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Returns `true` if the last frame consumed was a closing marker.
    #[must_use]
    pub fn is_clean_close(&self) -> bool {
        self.clean_close
    }

    /// Moves the cursor to `offset` and clears any sticky error.
    ///
    /// The offset is not validated; it must come from a previously observed
    /// position.
    pub fn seek(&mut self, offset: u64) {
        self.offset = offset;
        self.in_sync = false;
        self.record = None;
        self.clean_close = false;
        self.error = None;
    }

    /// Sticky error, if decoding hit corruption or an I/O failure.
    #[must_use]
    pub fn error(&self) -> Option<&WalError> {
        self.error.as_ref()
    }

    /// Removes and returns the sticky error.
    pub fn take_error(&mut self) -> Option<WalError> {
        self.error.take()
    }

    /// Path of the segment file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the reader, releasing its file handle.
    pub fn close(self) {}
}

impl std::fmt::Debug for SegmentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentReader")
            .field("path", &self.path)
            .field("offset", &self.offset)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::record::{encode, CLOSING_MAGIC, RECORD_OVERHEAD};
    use crate::segment::SegmentWriter;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn reads_what_was_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0");
        let mut writer = SegmentWriter::open(&path).unwrap();
        writer.append(b"this is data").unwrap();

        let mut reader = SegmentReader::open(&path).unwrap();
        assert!(reader.next_record(Some(RecordType::Data)));
        assert!(reader.error().is_none());
        assert_eq!(reader.value(), b"this is data");
        assert_ne!(reader.checksum(), 0);
    }

    #[test]
    fn filter_skips_other_types() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0");
        let mut writer = SegmentWriter::open(&path).unwrap();
        writer.append(b"one").unwrap();
        writer.append_tag("commit").unwrap();
        writer.append(b"two").unwrap();

        let mut tags = SegmentReader::open(&path).unwrap();
        assert!(tags.next_record(Some(RecordType::Tag)));
        assert_eq!(tags.value(), b"commit");
        assert!(!tags.next_record(Some(RecordType::Tag)));

        let mut all = SegmentReader::open(&path).unwrap();
        let mut types = Vec::new();
        while all.next_record(None) {
            types.push(all.record_type().unwrap());
        }
        assert_eq!(
            types,
            vec![RecordType::Data, RecordType::Tag, RecordType::Data]
        );
    }

    #[test]
    fn tails_a_live_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0");
        let mut writer = SegmentWriter::open(&path).unwrap();
        writer.append(b"first").unwrap();

        let mut reader = SegmentReader::open(&path).unwrap();
        assert!(reader.next_record(None));
        let frontier = reader.position();
        assert!(!reader.next_record(None));
        assert!(reader.error().is_none());
        assert_eq!(reader.position(), frontier);

        writer.append(b"second").unwrap();
        assert!(reader.next_record(None));
        assert_eq!(reader.value(), b"second");
    }

    #[test]
    fn partial_record_becomes_visible_when_completed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0");
        let frame = encode(RecordType::Data, b"split across writes").unwrap();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();
        file.write_all(&frame[..10]).unwrap();

        let mut reader = SegmentReader::open(&path).unwrap();
        assert!(!reader.next_record(None));
        assert!(reader.error().is_none());
        assert_eq!(reader.position(), 0);

        file.write_all(&frame[10..]).unwrap();
        assert!(reader.next_record(None));
        assert_eq!(reader.value(), b"split across writes");
    }

    #[test]
    fn steps_over_closing_marker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0");
        let mut writer = SegmentWriter::open(&path).unwrap();
        writer.append(b"before").unwrap();
        writer.close().unwrap();
        let mut writer = SegmentWriter::open(&path).unwrap();
        writer.append(b"after").unwrap();

        let mut reader = SegmentReader::open(&path).unwrap();
        assert!(reader.next_record(None));
        assert_eq!(reader.value(), b"before");
        assert!(reader.next_record(None));
        assert_eq!(reader.value(), b"after");
        assert!(!reader.is_clean_close());
    }

    #[test]
    fn end_position_includes_marker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0");
        let mut writer = SegmentWriter::open(&path).unwrap();
        writer.append(b"data").unwrap();
        let before_close = writer.position();
        writer.close().unwrap();

        let mut reader = SegmentReader::open(&path).unwrap();
        assert!(reader.next_record(None));
        assert!(!reader.next_record(None));
        assert!(reader.is_clean_close());
        assert_eq!(
            reader.position(),
            before_close + CLOSING_MAGIC.len() as u64
        );
    }

    #[test]
    fn corruption_is_sticky_until_seek() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0");
        let mut writer = SegmentWriter::open(&path).unwrap();
        writer.append(b"good").unwrap();
        writer.append(b"flipped").unwrap();
        drop(writer);

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let mut reader = SegmentReader::open(&path).unwrap();
        assert!(reader.next_record(None));
        assert!(!reader.next_record(None));
        assert!(matches!(
            reader.error(),
            Some(WalError::ChecksumMismatch { offset, .. }) if *offset == RECORD_OVERHEAD + 4
        ));
        assert!(!reader.next_record(None));

        reader.seek(0);
        assert!(reader.error().is_none());
        assert!(reader.next_record(None));
        assert_eq!(reader.value(), b"good");
    }

    #[test]
    fn seek_to_recorded_offset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0");
        let mut writer = SegmentWriter::open(&path).unwrap();
        writer.append(b"one").unwrap();
        let offset = writer.append(b"two").unwrap();

        let mut reader = SegmentReader::open(&path).unwrap();
        reader.seek(offset);
        assert!(reader.next_record(None));
        assert_eq!(reader.value(), b"two");
        assert_eq!(reader.record_offset(), Some(offset));
    }

    #[test]
    fn record_offset_skips_filtered_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0");
        let mut writer = SegmentWriter::open(&path).unwrap();
        writer.append_tag("commit").unwrap();
        let offset = writer.append(b"data").unwrap();

        let mut reader = SegmentReader::open(&path).unwrap();
        assert_eq!(reader.record_offset(), None);
        assert!(reader.next_record(Some(RecordType::Data)));
        assert_eq!(reader.record_offset(), Some(offset));
        assert!(!reader.next_record(None));
        assert_eq!(reader.record_offset(), None);
    }
}

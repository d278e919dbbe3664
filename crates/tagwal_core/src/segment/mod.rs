//! Segment files: record framing plus single-file writers and readers.
//!
//! A segment is one append-only file holding a run of records. Only the
//! current segment of a log is ever appended to; once the log rotates away
//! from it, a segment is immutable until it is pruned.

mod reader;
pub mod record;
mod sync;
mod writer;

pub use reader::SegmentReader;
pub use record::{RecordType, CLOSING_MAGIC, HEADER_SIZE, RECORD_OVERHEAD};
pub use writer::SegmentWriter;

use crate::error::{WalError, WalResult};
use std::path::Path;

/// Outcome of decoding a whole segment file.
#[derive(Debug)]
pub struct SegmentSummary {
    /// Number of data records decoded.
    pub data_records: u64,
    /// Number of tag records decoded.
    pub tag_records: u64,
    /// Offset at which decoding stopped.
    pub readable_len: u64,
    /// Size of the file when the scan finished.
    pub file_len: u64,
    /// Whether the last frame was a closing marker.
    pub clean_close: bool,
    /// Corruption or I/O failure that stopped the scan.
    pub error: Option<WalError>,
}

impl SegmentSummary {
    /// Returns `true` if bytes remain past the last complete record without
    /// any corruption being detected, e.g. a write cut short by a crash.
    #[must_use]
    pub fn has_torn_tail(&self) -> bool {
        self.error.is_none() && self.readable_len < self.file_len
    }

    /// Returns `true` if appending after the readable records is safe.
    #[must_use]
    pub fn is_appendable(&self) -> bool {
        self.error.is_none() && self.readable_len == self.file_len
    }
}

/// Decodes every frame of a segment file.
///
/// # Errors
///
/// Returns an error only if the file cannot be opened or stat'ed; decoding
/// failures are reported in [`SegmentSummary::error`].
pub fn scan_segment(path: impl AsRef<Path>) -> WalResult<SegmentSummary> {
    let path = path.as_ref();
    let mut reader = SegmentReader::open(path)?;

    let mut data_records = 0;
    let mut tag_records = 0;
    while reader.next_record(None) {
        match reader.record_type() {
            Some(RecordType::Data) => data_records += 1,
            Some(RecordType::Tag) => tag_records += 1,
            None => {}
        }
    }

    Ok(SegmentSummary {
        data_records,
        tag_records,
        readable_len: reader.position(),
        file_len: std::fs::metadata(path)?.len(),
        clean_close: reader.is_clean_close(),
        error: reader.take_error(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn summary_of_clean_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0");
        let mut writer = SegmentWriter::open(&path).unwrap();
        writer.append(b"a").unwrap();
        writer.append_tag("t").unwrap();
        writer.append(b"b").unwrap();
        writer.close().unwrap();

        let summary = scan_segment(&path).unwrap();
        assert_eq!(summary.data_records, 2);
        assert_eq!(summary.tag_records, 1);
        assert!(summary.clean_close);
        assert!(summary.is_appendable());
        assert!(!summary.has_torn_tail());
    }

    #[test]
    fn summary_of_torn_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0");
        let mut writer = SegmentWriter::open(&path).unwrap();
        writer.append(b"complete").unwrap();
        drop(writer);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[9, 0, 0, 0, 1]).unwrap();

        let summary = scan_segment(&path).unwrap();
        assert_eq!(summary.data_records, 1);
        assert!(summary.has_torn_tail());
        assert!(!summary.is_appendable());
    }
}

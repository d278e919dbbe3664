//! Resume-from-checkpoint entry point.

use crate::error::WalResult;
use crate::wal::LogReader;
use std::path::PathBuf;

/// Opens a reader positioned just after the latest `tag` record.
///
/// If `tag` was never written, or every segment holding it has been pruned,
/// the reader starts at the oldest retained record instead. Replaying from
/// the returned reader therefore re-delivers every record written after the
/// last durable checkpoint, plus possibly some before it.
///
/// # Errors
///
/// Returns [`crate::WalError::NoSegments`] for an empty log, and any other
/// failure of the tag lookup, such as an undecodable tag cache or I/O error.
pub fn begin_recovery(path: impl Into<PathBuf>, tag: &str) -> WalResult<LogReader> {
    let mut reader = LogReader::open(path)?;

    match reader.seek_tag(tag) {
        Ok(()) => {
            tracing::info!(
                path = %reader.path().display(),
                tag,
                position = ?reader.position(),
                "resuming log after tag"
            );
            Ok(reader)
        }
        Err(e) if e.is_end_of_log() => {
            reader.reset()?;
            tracing::info!(
                path = %reader.path().display(),
                tag,
                first = reader.first_segment(),
                "tag not found, replaying log from the start"
            );
            Ok(reader)
        }
        Err(e) => {
            tracing::warn!(tag, error = %e, "log recovery failed");
            reader.close();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WalError;
    use crate::wal::LogWriter;
    use tempfile::tempdir;

    #[test]
    fn resumes_after_tag() {
        let dir = tempdir().unwrap();
        let wal = LogWriter::open(dir.path()).unwrap();
        wal.write(b"applied").unwrap();
        wal.write_tag("commit").unwrap();
        wal.write(b"pending").unwrap();
        wal.close().unwrap();

        let mut reader = begin_recovery(dir.path(), "commit").unwrap();
        assert!(reader.next_record());
        assert_eq!(reader.value(), b"pending");
        assert!(!reader.next_record());
    }

    #[test]
    fn missing_tag_replays_everything() {
        let dir = tempdir().unwrap();
        let wal = LogWriter::open(dir.path()).unwrap();
        wal.write(b"one").unwrap();
        wal.write(b"two").unwrap();
        wal.close().unwrap();

        let mut reader = begin_recovery(dir.path(), "commit").unwrap();
        let replayed: Vec<_> = reader.records().map(Result::unwrap).collect();
        assert_eq!(replayed, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn truncated_cache_falls_back_to_scan() {
        let dir = tempdir().unwrap();
        let wal = LogWriter::open(dir.path()).unwrap();
        wal.write(b"applied").unwrap();
        wal.write_tag("commit").unwrap();
        wal.write(b"pending").unwrap();
        wal.close().unwrap();
        // Crash after the cache was truncated but before it was rewritten.
        std::fs::write(dir.path().join("tags"), b"").unwrap();

        let mut reader = begin_recovery(dir.path(), "commit").unwrap();
        assert!(reader.next_record());
        assert_eq!(reader.value(), b"pending");
        assert!(!reader.next_record());
    }

    #[test]
    fn corrupt_cache_is_fatal() {
        let dir = tempdir().unwrap();
        let wal = LogWriter::open(dir.path()).unwrap();
        wal.write_tag("commit").unwrap();
        wal.close().unwrap();
        std::fs::write(dir.path().join("tags"), b"[1, 2").unwrap();

        assert!(matches!(
            begin_recovery(dir.path(), "commit"),
            Err(WalError::TagCache(_))
        ));
    }

    #[test]
    fn empty_log_has_nothing_to_recover() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            begin_recovery(dir.path(), "commit"),
            Err(WalError::NoSegments)
        ));
    }
}

//! Property tests for the log.

use proptest::prelude::*;
use tagwal_core::segment::record::checksum;
use tagwal_core::{LogReader, LogWriter, WriteOptions};
use tempfile::tempdir;

fn payloads() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..200), 1..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn records_read_back_in_write_order(records in payloads(), segment_size in 16u64..512) {
        let dir = tempdir().unwrap();
        let wal = LogWriter::open_with_options(
            dir.path(),
            WriteOptions::new().segment_size(segment_size).max_segments(usize::MAX),
        )
        .unwrap();
        for record in &records {
            wal.write(record).unwrap();
        }
        wal.close().unwrap();

        let mut reader = LogReader::open(dir.path()).unwrap();
        let read: Vec<Vec<u8>> = reader.records().collect::<Result<_, _>>().unwrap();
        prop_assert_eq!(read, records);
    }

    #[test]
    fn every_write_position_seeks_to_its_record(records in payloads()) {
        let dir = tempdir().unwrap();
        let wal = LogWriter::open_with_options(
            dir.path(),
            WriteOptions::new().segment_size(128).max_segments(usize::MAX),
        )
        .unwrap();
        let positions: Vec<_> = records.iter().map(|r| wal.write(r).unwrap()).collect();

        let mut reader = LogReader::open(dir.path()).unwrap();
        for (pos, record) in positions.iter().zip(&records).rev() {
            reader.seek(*pos).unwrap();
            prop_assert!(reader.next_record());
            prop_assert_eq!(reader.value(), record.as_slice());
            prop_assert_eq!(reader.record_position(), Some(*pos));
            prop_assert_eq!(reader.checksum(), checksum(record));
        }
    }

    #[test]
    fn recovery_resumes_after_last_tag(records in payloads(), split in any::<prop::sample::Index>()) {
        let dir = tempdir().unwrap();
        let wal = LogWriter::open_with_options(
            dir.path(),
            WriteOptions::new().segment_size(256).max_segments(usize::MAX),
        )
        .unwrap();
        let split = split.index(records.len() + 1);
        for record in &records[..split] {
            wal.write(record).unwrap();
        }
        wal.write_tag("commit").unwrap();
        for record in &records[split..] {
            wal.write(record).unwrap();
        }
        drop(wal);

        let mut reader = tagwal_core::begin_recovery(dir.path(), "commit").unwrap();
        let replay: Vec<Vec<u8>> = reader.records().collect::<Result<_, _>>().unwrap();
        prop_assert_eq!(replay, records[split..].to_vec());
    }
}

//! Dump command implementation.

use serde::Serialize;
use std::path::Path;
use tagwal_core::{begin_recovery, LogReader, Position};

/// Bytes of payload shown per record in text output.
const PREVIEW_LEN: usize = 64;

/// Where the dump starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Start {
    /// The oldest retained record.
    Beginning,
    /// Right after the latest occurrence of a tag, or the beginning if the
    /// tag was never written.
    Tag(String),
    /// An explicit position.
    Position(Position),
}

/// Data record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Position at which the record starts.
    pub position: Position,
    /// Payload size in bytes.
    pub len: usize,
    /// Stored payload checksum.
    pub checksum: u16,
    /// Payload, lossily decoded as UTF-8.
    pub payload: String,
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    start: &Start,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (records, error) = read_records(path, start, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    match error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Reads up to `limit` data records from `start`.
///
/// Records decoded before the reader stopped are returned together with the
/// error that stopped it.
pub fn read_records(
    path: &Path,
    start: &Start,
    limit: Option<usize>,
) -> Result<(Vec<RecordInfo>, Option<tagwal_core::WalError>), Box<dyn std::error::Error>> {
    let mut reader = match start {
        Start::Beginning => LogReader::open(path)?,
        Start::Tag(tag) => begin_recovery(path, tag)?,
        Start::Position(position) => {
            let mut reader = LogReader::open(path)?;
            reader.seek(*position)?;
            reader
        }
    };

    let mut records = Vec::new();
    while limit.is_none_or(|limit| records.len() < limit) {
        if !reader.next_record() {
            break;
        }
        let Some(position) = reader.record_position() else {
            break;
        };
        let value = reader.value();
        records.push(RecordInfo {
            position,
            len: value.len(),
            checksum: reader.checksum(),
            payload: String::from_utf8_lossy(value).into_owned(),
        });
    }

    Ok((records, reader.take_error()))
}

fn print_text_output(records: &[RecordInfo]) {
    for record in records {
        let preview: String = record.payload.chars().take(PREVIEW_LEN).collect();
        let ellipsis = if record.payload.chars().count() > PREVIEW_LEN {
            "..."
        } else {
            ""
        };
        println!(
            "{:<16} len={:<8} crc={:04x}  {:?}{}",
            record.position.to_string(),
            record.len,
            record.checksum,
            preview,
            ellipsis
        );
    }
    println!();
    println!("{} record(s)", records.len());
}

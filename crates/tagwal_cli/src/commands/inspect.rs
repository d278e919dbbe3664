//! Inspect command implementation.

use serde::Serialize;
use std::path::Path;
use tagwal_core::segment::scan_segment;
use tagwal_core::{LogDir, Position, TagCache};

/// Log directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log directory path.
    pub path: String,
    /// Oldest segment index.
    pub first_segment: u64,
    /// Newest segment index.
    pub last_segment: u64,
    /// Total size of all segments in bytes.
    pub total_size: u64,
    /// Per-segment statistics.
    pub segments: Vec<SegmentStats>,
    /// Cached tag positions.
    pub tags: Vec<TagEntry>,
    /// Why the tag cache could not be read, if it couldn't.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_cache_error: Option<String>,
}

/// Statistics for a single segment.
#[derive(Debug, Serialize)]
pub struct SegmentStats {
    /// Segment index.
    pub index: u64,
    /// File size in bytes.
    pub size: u64,
    /// Number of data records.
    pub data_records: u64,
    /// Number of tag records.
    pub tag_records: u64,
    /// Whether the segment ends in a closing marker.
    pub clean_close: bool,
    /// Whether undecodable bytes follow the last record.
    pub torn_tail: bool,
    /// Decoding error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One tag cache entry.
#[derive(Debug, Serialize)]
pub struct TagEntry {
    /// Tag name.
    pub name: String,
    /// Cached position of the tag record.
    pub position: Position,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects statistics for the log at `path`.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let dir = LogDir::new(path);
    let indices = dir.segment_indices()?;
    let (Some(&first), Some(&last)) = (indices.first(), indices.last()) else {
        return Err(format!("No log found at {:?}", path).into());
    };

    let mut segments = Vec::with_capacity(indices.len());
    for index in indices {
        let summary = scan_segment(dir.segment_path(index))?;
        segments.push(SegmentStats {
            index,
            size: summary.file_len,
            data_records: summary.data_records,
            tag_records: summary.tag_records,
            clean_close: summary.clean_close,
            torn_tail: summary.has_torn_tail(),
            error: summary.error.map(|e| e.to_string()),
        });
    }

    let (tags, tag_cache_error) = match TagCache::load(&dir.tags_path()) {
        Ok(cache) => {
            let tags = cache
                .map(|cache| {
                    cache
                        .iter()
                        .map(|(name, position)| TagEntry {
                            name: name.to_string(),
                            position,
                        })
                        .collect()
                })
                .unwrap_or_default();
            (tags, None)
        }
        Err(e) => (Vec::new(), Some(e.to_string())),
    };

    Ok(InspectResult {
        path: path.display().to_string(),
        first_segment: first,
        last_segment: last,
        total_size: segments.iter().map(|s| s.size).sum(),
        segments,
        tags,
        tag_cache_error,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Log: {}", result.path);
    println!(
        "Segments: {}..={} ({} files, {} bytes)",
        result.first_segment,
        result.last_segment,
        result.segments.len(),
        result.total_size
    );
    println!();

    println!(
        "{:>8} {:>12} {:>8} {:>6} {:>6}  status",
        "segment", "size", "data", "tags", "closed"
    );
    for segment in &result.segments {
        let status = match (&segment.error, segment.torn_tail) {
            (Some(e), _) => format!("error: {e}"),
            (None, true) => "torn tail".to_string(),
            (None, false) => "ok".to_string(),
        };
        println!(
            "{:>8} {:>12} {:>8} {:>6} {:>6}  {}",
            segment.index,
            segment.size,
            segment.data_records,
            segment.tag_records,
            if segment.clean_close { "yes" } else { "no" },
            status
        );
    }

    println!();
    if let Some(e) = &result.tag_cache_error {
        println!("Tag cache unreadable: {e}");
    } else if result.tags.is_empty() {
        println!("No cached tags");
    } else {
        println!("Cached tags:");
        for tag in &result.tags {
            println!("  {} -> {}", tag.name, tag.position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagwal_core::LogWriter;
    use tempfile::tempdir;

    #[test]
    fn reports_segments_and_tags() {
        let dir = tempdir().unwrap();
        let wal = LogWriter::open(dir.path()).unwrap();
        wal.write(b"one").unwrap();
        wal.write_tag("commit").unwrap();
        wal.rotate().unwrap();
        wal.write(b"two").unwrap();

        let result = inspect(dir.path()).unwrap();
        assert_eq!(result.first_segment, 0);
        assert_eq!(result.last_segment, 1);
        assert_eq!(result.segments[0].data_records, 1);
        assert_eq!(result.segments[0].tag_records, 1);
        assert!(result.segments[0].clean_close);
        assert!(!result.segments[1].clean_close);
        assert_eq!(result.tags.len(), 1);
        assert_eq!(result.tags[0].position, Position::new(0, 10));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(inspect(dir.path()).is_err());
    }
}

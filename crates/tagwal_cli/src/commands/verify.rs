//! Verify command implementation.

use std::path::Path;
use tagwal_core::segment::{scan_segment, RecordType, SegmentReader};
use tagwal_core::{LogDir, Position, TagCache};

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of segments checked.
    pub segments_checked: usize,
    /// Number of records decoded successfully.
    pub valid_records: u64,
    /// Corruption found; any entry fails verification.
    pub errors: Vec<String>,
    /// Recoverable findings such as torn tails or stale cache entries.
    pub warnings: Vec<String>,
}

impl VerifyResult {
    /// Returns `true` if no corruption was found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying log at {:?}", path);
    println!();

    let result = verify(path)?;

    println!("Segments checked: {}", result.segments_checked);
    println!("Valid records:    {}", result.valid_records);
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
    for error in &result.errors {
        println!("  error: {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Log verification passed");
        Ok(())
    } else {
        println!("✗ Log verification failed");
        Err("Verification failed".into())
    }
}

/// Decodes every segment and checks the tag cache against the log.
pub fn verify(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let dir = LogDir::new(path);
    let indices = dir.segment_indices()?;
    if indices.is_empty() {
        return Err(format!("No log found at {:?}", path).into());
    }

    let mut result = VerifyResult::default();

    for window in indices.windows(2) {
        if window[1] != window[0] + 1 {
            result.errors.push(format!(
                "segments {}..{} are missing",
                window[0] + 1,
                window[1]
            ));
        }
    }

    for &index in &indices {
        let summary = scan_segment(dir.segment_path(index))?;
        result.segments_checked += 1;
        result.valid_records += summary.data_records + summary.tag_records;

        if let Some(e) = &summary.error {
            result.errors.push(format!("segment {index}: {e}"));
        } else if summary.has_torn_tail() {
            result.warnings.push(format!(
                "segment {index}: {} undecodable bytes after offset {}",
                summary.file_len - summary.readable_len,
                summary.readable_len
            ));
        }
    }

    match TagCache::load(&dir.tags_path()) {
        Ok(Some(cache)) => {
            for (name, position) in cache.iter() {
                if let Some(problem) = check_tag(&dir, name, position) {
                    result
                        .warnings
                        .push(format!("tag {name:?} at {position}: {problem}"));
                }
            }
        }
        Ok(None) => {}
        Err(e) => result.warnings.push(format!("tag cache: {e}")),
    }

    Ok(result)
}

/// Checks that the record at `position` is the tag `name`.
fn check_tag(dir: &LogDir, name: &str, position: Position) -> Option<String> {
    let mut reader = match SegmentReader::open(dir.segment_path(position.segment)) {
        Ok(reader) => reader,
        Err(e) => return Some(e.to_string()),
    };
    reader.seek(position.offset);

    if !reader.next_record(None) {
        return Some(match reader.error() {
            Some(e) => e.to_string(),
            None => "no record at cached position".to_string(),
        });
    }
    if reader.record_type() != Some(RecordType::Tag) || reader.value() != name.as_bytes() {
        return Some("cached position does not hold this tag".to_string());
    }
    None
}

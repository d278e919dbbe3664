//! Core type definitions for tagwal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a byte cursor within one segment of a log.
///
/// Positions are only meaningful for the log directory that produced them.
/// Segment indices increase monotonically and are never reused, so a stale
/// position can point at a pruned segment but never at a different one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Segment index (the segment's file name).
    pub segment: u64,
    /// Byte offset within the segment.
    pub offset: u64,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub const fn new(segment: u64, offset: u64) -> Self {
        Self { segment, offset }
    }

    /// Position at the start of a segment.
    #[must_use]
    pub const fn start_of(segment: u64) -> Self {
        Self { segment, offset: 0 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.segment, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_segment_then_offset() {
        assert!(Position::new(0, 100) < Position::new(1, 0));
        assert!(Position::new(1, 5) < Position::new(1, 6));
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_string(&Position::new(3, 17)).unwrap();
        assert_eq!(json, r#"{"segment":3,"offset":17}"#);
    }

    #[test]
    fn display() {
        assert_eq!(Position::start_of(4).to_string(), "4:0");
    }
}

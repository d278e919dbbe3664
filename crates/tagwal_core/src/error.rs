//! Error types for tagwal.

use std::io;
use thiserror::Error;

/// Result type for log operations.
pub type WalResult<T> = Result<T, WalError>;

/// Errors that can occur while writing or reading the log.
#[derive(Debug, Error)]
pub enum WalError {
    /// I/O error, propagated verbatim.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A fully read record failed checksum verification.
    #[error("checksum mismatch at offset {offset}: expected {expected:04x}, got {actual:04x}")]
    ChecksumMismatch {
        /// Offset of the record header within its segment.
        offset: u64,
        /// Checksum stored in the record header.
        expected: u16,
        /// Checksum computed over the payload.
        actual: u16,
    },

    /// A record header could not be interpreted.
    #[error("log corruption at offset {offset}: {message}")]
    Corruption {
        /// Offset of the offending header within its segment.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// The log directory holds no segments, or no record was found.
    #[error("no segments")]
    NoSegments,

    /// The requested tag does not appear anywhere in the log.
    ///
    /// This is the end-of-log condition of a tag search.
    #[error("tag not found: {tag}")]
    TagNotFound {
        /// The tag that was searched for.
        tag: String,
    },

    /// The tag cache file exists but could not be decoded.
    #[error("tag cache decode failed: {0}")]
    TagCache(#[from] serde_json::Error),

    /// A segment disappeared between a directory scan and opening it.
    ///
    /// This happens when a writer prunes segments a reader has not reached
    /// yet. Resetting the reader rescans the directory.
    #[error("segment {segment} vanished")]
    SegmentVanished {
        /// Index of the missing segment.
        segment: u64,
    },

    /// Payload is too large for the 4-byte length field.
    #[error("payload too large: {len} bytes")]
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
    },

    /// Write options were rejected.
    #[error("invalid options: {message}")]
    InvalidOptions {
        /// Why the options were rejected.
        message: String,
    },

    /// The writer has been closed.
    #[error("log writer is closed")]
    Closed,
}

impl WalError {
    /// Creates a framing corruption error.
    pub fn corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::Corruption {
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid options error.
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }

    /// Creates a tag not found error.
    pub fn tag_not_found(tag: impl Into<String>) -> Self {
        Self::TagNotFound { tag: tag.into() }
    }

    /// Returns `true` if this error marks the end of the log during a tag search.
    #[must_use]
    pub fn is_end_of_log(&self) -> bool {
        matches!(self, Self::TagNotFound { .. })
    }

    /// Returns `true` if this error reports corrupted bytes.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. } | Self::Corruption { .. })
    }
}

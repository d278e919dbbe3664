//! # tagwal
//!
//! A segmented, append-only write-ahead log with named checkpoints.
//!
//! Records are appended to numbered segment files in one directory. The
//! writer rotates to a new segment when the current one would grow past its
//! size limit and prunes old segments by count and age. Applications mark
//! durable checkpoints by writing a named *tag*; after a restart,
//! [`begin_recovery`] resumes reading right after the latest tag, so every
//! record written since the checkpoint is replayed at least once.
//!
//! ## Guarantees
//!
//! - One [`LogWriter`] imposes a single total order on records, even when
//!   shared between threads
//! - The tag cache never names a tag record that is not durable on disk
//! - Readers stop at the first corrupted record and never skip past it
//! - Readers can tail a live writer, including across rotations
//!
//! ## Example
//!
//! ```rust
//! use tagwal_core::{begin_recovery, LogWriter};
//!
//! let dir = tempfile::tempdir().unwrap();
//!
//! let wal = LogWriter::open(dir.path()).unwrap();
//! wal.write(b"applied").unwrap();
//! wal.write_tag("commit").unwrap();
//! wal.write(b"pending").unwrap();
//! wal.close().unwrap();
//!
//! let mut reader = begin_recovery(dir.path(), "commit").unwrap();
//! assert!(reader.next_record());
//! assert_eq!(reader.value(), b"pending");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
pub mod segment;
mod types;
mod wal;

pub use config::{WriteOptions, DEFAULT_MAX_SEGMENTS, MAX_SEGMENT_SIZE};
pub use dir::{LogDir, TAGS_FILE};
pub use error::{WalError, WalResult};
pub use types::Position;
pub use wal::{begin_recovery, LogReader, LogWriter, Records, TagCache};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

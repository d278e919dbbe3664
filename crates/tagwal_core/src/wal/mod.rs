//! The segmented log: a writer that rotates and prunes segment files, a
//! reader that chains them, and tag-based recovery.
//!
//! A log directory looks like this:
//!
//! ```text
//! wal/
//! ├── 3       oldest retained segment
//! ├── 4
//! ├── 5       current segment (appended to)
//! └── tags    tag cache: {"tags":{"commit":{"segment":4,"offset":96}}}
//! ```
//!
//! Applications write data records and, at durable checkpoints, a named
//! tag. After a restart [`begin_recovery`] positions a reader right after
//! the latest occurrence of that tag, or at the start of the log if there
//! is none.

mod reader;
mod recovery;
mod tags;
mod writer;

pub use reader::{LogReader, Records};
pub use recovery::begin_recovery;
pub use tags::TagCache;
pub use writer::LogWriter;

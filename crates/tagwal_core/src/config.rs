//! Log writer configuration.

use crate::error::{WalError, WalResult};
use std::time::Duration;

/// Largest segment size chosen when deriving options from a disk budget.
pub const MAX_SEGMENT_SIZE: u64 = 16 * 1024 * 1024;

/// Default number of retained segments (160 MiB with default segment size).
pub const DEFAULT_MAX_SEGMENTS: usize = 10;

/// Configuration for a [`crate::LogWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Target size of a segment file in bytes.
    ///
    /// A write that would push the current segment past this size rotates
    /// to a new segment first.
    pub segment_size: u64,

    /// Maximum number of segments kept on disk, counting back from the
    /// current segment.
    pub max_segments: usize,

    /// Segments whose modification time is older than this are pruned even
    /// when the count limit would keep them (zero = disabled).
    pub segment_ttl: Duration,

    /// How often the current segment is synced (zero = sync every write).
    pub sync_interval: Duration,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            segment_size: MAX_SEGMENT_SIZE,
            max_segments: DEFAULT_MAX_SEGMENTS,
            segment_ttl: Duration::ZERO,   // disabled
            sync_interval: Duration::ZERO, // sync every write
        }
    }
}

impl WriteOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives segment size and count from a total disk budget.
    ///
    /// The footprint may slightly exceed `total` since the segment count is
    /// rounded up.
    #[must_use]
    pub fn from_total_size(total: u64) -> Self {
        let mut options = Self {
            max_segments: 0,
            ..Self::default()
        };
        options.calculate_from_total(total);
        options
    }

    /// Recomputes `segment_size` (and `max_segments` when it is zero) so the
    /// log consumes roughly `total` bytes.
    pub fn calculate_from_total(&mut self, total: u64) {
        if self.max_segments == 0 {
            if total < MAX_SEGMENT_SIZE {
                self.max_segments = 1;
                self.segment_size = total;
            } else {
                self.segment_size = MAX_SEGMENT_SIZE;
                self.max_segments = usize::try_from(total.div_ceil(MAX_SEGMENT_SIZE))
                    .unwrap_or(usize::MAX);
            }
        } else {
            self.segment_size = total / self.max_segments as u64;
        }
    }

    /// Sets the segment size target.
    #[must_use]
    pub const fn segment_size(mut self, size: u64) -> Self {
        self.segment_size = size;
        self
    }

    /// Sets the number of retained segments.
    #[must_use]
    pub const fn max_segments(mut self, count: usize) -> Self {
        self.max_segments = count;
        self
    }

    /// Sets the segment time-to-live.
    #[must_use]
    pub const fn segment_ttl(mut self, ttl: Duration) -> Self {
        self.segment_ttl = ttl;
        self
    }

    /// Sets the sync interval.
    #[must_use]
    pub const fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Checks that the options describe a usable log.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::InvalidOptions`] if `segment_size` or
    /// `max_segments` is zero.
    pub fn validate(&self) -> WalResult<()> {
        if self.segment_size == 0 {
            return Err(WalError::invalid_options("segment_size must be non-zero"));
        }
        if self.max_segments == 0 {
            return Err(WalError::invalid_options("max_segments must be at least 1"));
        }
        Ok(())
    }
}

//! Store configuration.

use serde::{Deserialize, Serialize};

/// Settings shared by every store opened on a [`crate::Database`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Largest accepted explicit `pageSize`.
    pub max_page_size: u32,

    /// Deepest accepted filter tree.
    pub max_filter_depth: usize,

    /// Records read per batch while reindexing.
    pub reindex_batch_size: u32,

    /// Log reindex progress every this many records.
    pub reindex_progress_interval: u64,

    /// Whether write transactions produce revisions.
    pub track_revisions: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_page_size: 10_000,
            max_filter_depth: 32,
            reindex_batch_size: 500,
            reindex_progress_interval: 1_000,
            track_revisions: true,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest accepted page size.
    #[must_use]
    pub const fn max_page_size(mut self, size: u32) -> Self {
        self.max_page_size = size;
        self
    }

    /// Sets the deepest accepted filter tree.
    #[must_use]
    pub const fn max_filter_depth(mut self, depth: usize) -> Self {
        self.max_filter_depth = depth;
        self
    }

    /// Sets the reindex batch size. Zero is treated as one.
    #[must_use]
    pub const fn reindex_batch_size(mut self, size: u32) -> Self {
        self.reindex_batch_size = if size == 0 { 1 } else { size };
        self
    }

    /// Sets the reindex progress log interval.
    #[must_use]
    pub const fn reindex_progress_interval(mut self, records: u64) -> Self {
        self.reindex_progress_interval = records;
        self
    }

    /// Enables or disables revision tracking.
    #[must_use]
    pub const fn track_revisions(mut self, value: bool) -> Self {
        self.track_revisions = value;
        self
    }
}

//! I/O counters kept by every backend.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ReadStats {
    index_reads: AtomicU64,
    data_reads: AtomicU64,
    decompressions: AtomicU64,
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadStatsSnapshot {
    pub index_reads: u64,
    pub data_reads: u64,
    pub decompressions: u64,
}

impl ReadStats {
    pub fn record_index_read(&self) {
        self.index_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_data_read(&self) {
        self.data_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decompression(&self) {
        self.decompressions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReadStatsSnapshot {
        ReadStatsSnapshot {
            index_reads: self.index_reads.load(Ordering::Relaxed),
            data_reads: self.data_reads.load(Ordering::Relaxed),
            decompressions: self.decompressions.load(Ordering::Relaxed),
        }
    }
}

//! In-process counters for split scans.
//!
//! Counters are lock-free so a single [`ScanMetrics`] can be shared by every
//! reader in a worker and updated on the row path.

use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregated counters across readers.
#[derive(Debug, Default)]
pub struct ScanMetrics {
    /// Number of readers that started a scan.
    scans: AtomicU64,
    /// Statement executions attempted, including retries and page fetches.
    executions: AtomicU64,
    /// Executions retried after a transient failure.
    retries: AtomicU64,
    /// Pages received from the driver.
    pages: AtomicU64,
    /// Rows handed to callers.
    rows_returned: AtomicU64,
    /// Raw value bytes handed to callers.
    bytes_returned: AtomicU64,
    /// Equals/IN scans skipped because no candidate fell in the split.
    empty_in_filter: AtomicU64,
    /// Scans that ended with a fatal error.
    failures: AtomicU64,
}

/// Immutable snapshot view of [`ScanMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanMetricsSnapshot {
    pub scans: u64,
    pub executions: u64,
    pub retries: u64,
    pub pages: u64,
    pub rows_returned: u64,
    pub bytes_returned: u64,
    pub empty_in_filter: u64,
    pub failures: u64,
}

impl ScanMetrics {
    pub fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_execution(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page(&self) {
        self.pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_row(&self, bytes: usize) {
        self.rows_returned.fetch_add(1, Ordering::Relaxed);
        self.bytes_returned
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_empty_in_filter(&self) {
        self.empty_in_filter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ScanMetricsSnapshot {
        ScanMetricsSnapshot {
            scans: self.scans.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            pages: self.pages.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
            bytes_returned: self.bytes_returned.load(Ordering::Relaxed),
            empty_in_filter: self.empty_in_filter.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Per-scan counters kept by one reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Executions attempted, retries included.
    pub executions: u64,
    /// Executions repeated after a transient failure.
    pub retries: u64,
    /// Pages received.
    pub pages: u64,
    /// Rows handed to the caller.
    pub rows_returned: u64,
}

//! Metrics for filter indexing and queries
//!
//! ## Usage
//!
//! ```ignore
//! use qc_07_block_filter_index::metrics::IndexMetrics;
//!
//! let metrics = Arc::new(IndexMetrics::new());
//! metrics.record_block_indexed(Duration::from_micros(250));
//! assert_eq!(metrics.snapshot().blocks_indexed, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters shared by the chain tracker and the query service.
#[derive(Default, Debug)]
pub struct IndexMetrics {
    /// Filters computed and committed
    pub blocks_indexed: AtomicU64,
    /// Filters removed on disconnect or repair
    pub blocks_retired: AtomicU64,
    /// Blocks the codec rejected
    pub codec_failures: AtomicU64,
    /// Failed reads or writes against the index store
    pub storage_failures: AtomicU64,
    /// Block source lookups that failed or came back empty
    pub source_failures: AtomicU64,
    /// Queries answered with a filter
    pub queries_served: AtomicU64,
    /// Queries answered with an error
    pub query_errors: AtomicU64,
    /// Queries answered from the cache
    pub cache_hits: AtomicU64,
    /// Cumulative filter computation time in nanoseconds
    pub index_time_ns: AtomicU64,
}

impl IndexMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one committed filter and the time spent building it.
    pub fn record_block_indexed(&self, duration: Duration) {
        self.blocks_indexed.fetch_add(1, Ordering::Relaxed);
        self.index_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_blocks_retired(&self, count: u64) {
        self.blocks_retired.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_codec_failure(&self) {
        self.codec_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_storage_failure(&self) {
        self.storage_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_source_failure(&self) {
        self.source_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query(&self, ok: bool, cache_hit: bool) {
        if ok {
            self.queries_served.fetch_add(1, Ordering::Relaxed);
        } else {
            self.query_errors.fetch_add(1, Ordering::Relaxed);
        }
        if cache_hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Average time to build one filter, in nanoseconds
    pub fn avg_index_time_ns(&self) -> u64 {
        let total = self.index_time_ns.load(Ordering::Relaxed);
        let count = self.blocks_indexed.load(Ordering::Relaxed);
        if count > 0 {
            total / count
        } else {
            0
        }
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks_indexed: self.blocks_indexed.load(Ordering::Relaxed),
            blocks_retired: self.blocks_retired.load(Ordering::Relaxed),
            codec_failures: self.codec_failures.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            source_failures: self.source_failures.load(Ordering::Relaxed),
            queries_served: self.queries_served.load(Ordering::Relaxed),
            query_errors: self.query_errors.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            avg_index_ns: self.avg_index_time_ns(),
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub blocks_indexed: u64,
    pub blocks_retired: u64,
    pub codec_failures: u64,
    pub storage_failures: u64,
    pub source_failures: u64,
    pub queries_served: u64,
    pub query_errors: u64,
    pub cache_hits: u64,
    pub avg_index_ns: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let snapshot = IndexMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_record_indexing() {
        let metrics = IndexMetrics::new();

        metrics.record_block_indexed(Duration::from_nanos(100));
        metrics.record_block_indexed(Duration::from_nanos(300));
        metrics.record_blocks_retired(1);
        metrics.record_codec_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.blocks_indexed, 2);
        assert_eq!(snapshot.avg_index_ns, 200);
        assert_eq!(snapshot.blocks_retired, 1);
        assert_eq!(snapshot.codec_failures, 1);
    }

    #[test]
    fn test_record_queries() {
        let metrics = IndexMetrics::new();

        metrics.record_query(true, false);
        metrics.record_query(true, true);
        metrics.record_query(false, false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.queries_served, 2);
        assert_eq!(snapshot.query_errors, 1);
        assert_eq!(snapshot.cache_hits, 1);
    }
}

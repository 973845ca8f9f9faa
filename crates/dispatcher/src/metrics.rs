//! Sink metrics for observability
//!
//! Atomics back the end-of-run summary; the same events also go to the
//! `metrics` facade for the Prometheus exporter.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Sink name, used as the `sink` label
    name: String,
    /// Current queue length
    queue_len: AtomicUsize,
    /// Commands delivered
    write_count: AtomicU64,
    /// Delivery failures
    failure_count: AtomicU64,
    /// Commands dropped because the queue was full
    dropped_count: AtomicU64,
}

impl SinkMetrics {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
        ::metrics::gauge!("sink_queue_len", "sink" => self.name.clone()).set(len as f64);
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    pub fn inc_write_count(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("sink_writes_total", "sink" => self.name.clone()).increment(1);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("sink_failures_total", "sink" => self.name.clone()).increment(1);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("sink_dropped_total", "sink" => self.name.clone()).increment(1);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = SinkMetrics::new("udp");
        metrics.inc_write_count();
        metrics.inc_write_count();
        metrics.inc_dropped_count();
        metrics.set_queue_len(3);
        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                queue_len: 3,
                write_count: 2,
                failure_count: 0,
                dropped_count: 1,
            }
        );
    }
}

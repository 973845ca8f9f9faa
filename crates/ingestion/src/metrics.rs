//! Ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion counters shared by all adapters
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Records accepted into a slot
    pub records_received: AtomicU64,

    /// Records dropped as malformed
    pub records_malformed: AtomicU64,

    /// Accepted records that replaced an unread value
    pub records_overwritten: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self, stream: &'static str) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("ingestion_records_total", "source" => stream).increment(1);
    }

    pub fn record_malformed(&self, stream: &'static str) {
        self.records_malformed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "ingestion_records_dropped_total",
            "source" => stream,
            "reason" => "malformed"
        )
        .increment(1);
    }

    pub fn record_overwritten(&self, stream: &'static str) {
        self.records_overwritten.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("ingestion_slot_overwrites_total", "source" => stream).increment(1);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            records_malformed: self.records_malformed.load(Ordering::Relaxed),
            records_overwritten: self.records_overwritten.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_received: u64,
    pub records_malformed: u64,
    pub records_overwritten: u64,
}

//! Ingestion Pipeline main entry

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{RecordSource, StreamKind};
use tracing::{debug, info, instrument};

use crate::adapter::{RecordAdapter, RecordTap};
use crate::error::Result;
use crate::generic_adapter::{deliver, GenericRecordAdapter};
use crate::metrics::IngestionMetrics;
use crate::normalize::parse_line;
use crate::slot::SlotBank;

/// Ingestion Pipeline
///
/// Owns the slot bank and the adapters writing into it. The decision loop
/// holds a clone of [`IngestionPipeline::bank`] and reads it at tick boundaries.
pub struct IngestionPipeline {
    /// Registered adapters, ordered by id for stable start/stop logs
    adapters: BTreeMap<String, Box<dyn RecordAdapter>>,

    /// Shared slots
    bank: Arc<SlotBank>,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,

    /// Optional observer for accepted records
    tap: Option<RecordTap>,
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionPipeline {
    pub fn new() -> Self {
        Self {
            adapters: BTreeMap::new(),
            bank: Arc::new(SlotBank::new()),
            metrics: Arc::new(IngestionMetrics::new()),
            tap: None,
        }
    }

    /// Observe every accepted record, e.g. to record input streams.
    ///
    /// Only affects adapters started afterwards.
    pub fn with_tap(mut self, tap: RecordTap) -> Self {
        self.tap = Some(tap);
        self
    }

    /// Register a record source
    #[instrument(
        name = "ingestion_register_source",
        skip(self, source),
        fields(source_id = %source_id)
    )]
    pub fn register_source(&mut self, source_id: String, source: Box<dyn RecordSource>) {
        let adapter = GenericRecordAdapter::new(source_id.clone(), source);
        debug!(source_id = %source_id, stream = %adapter.stream(), "registered record source");
        self.adapters.insert(source_id, Box::new(adapter));
    }

    /// Start all registered sources
    #[instrument(name = "ingestion_start_all", skip(self))]
    pub fn start_all(&self) {
        info!(count = self.adapters.len(), "starting all record adapters");
        for (source_id, adapter) in &self.adapters {
            if !adapter.is_listening() {
                debug!(source_id = %source_id, "starting adapter");
                adapter.start(self.bank.clone(), self.metrics.clone(), self.tap.clone());
            }
        }
    }

    /// Stop all sources
    #[instrument(name = "ingestion_stop_all", skip(self))]
    pub fn stop_all(&self) {
        info!(count = self.adapters.len(), "stopping all record adapters");
        for (source_id, adapter) in &self.adapters {
            if adapter.is_listening() {
                debug!(source_id = %source_id, "stopping adapter");
                adapter.stop();
            }
        }
    }

    /// Ingest one JSON line from an external producer.
    ///
    /// Malformed lines are counted and returned as errors; the slot is untouched.
    pub fn ingest_line(&self, stream: StreamKind, line: &str) -> Result<()> {
        match parse_line(stream, line) {
            Ok(record) => {
                deliver("line", record, &self.bank, &self.metrics, self.tap.as_ref());
                Ok(())
            }
            Err(e) => {
                self.metrics.record_malformed(stream.label());
                tracing::warn!(stream = %stream, error = %e, "dropping malformed line");
                Err(e)
            }
        }
    }

    /// Shared slot bank
    pub fn bank(&self) -> Arc<SlotBank> {
        self.bank.clone()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Get registered source count
    pub fn source_count(&self) -> usize {
        self.adapters.len()
    }

    /// Check if specified source is listening
    pub fn is_source_listening(&self, source_id: &str) -> bool {
        self.adapters
            .get(source_id)
            .map(|a| a.is_listening())
            .unwrap_or(false)
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.stop_all();
    }
}

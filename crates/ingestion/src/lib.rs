//! # Ingestion
//!
//! Input side of the decision loop.
//!
//! Responsibilities:
//! - Register record sources (Mock and real producers share one interface)
//! - Normalize records, drop malformed ones
//! - Keep the latest record per stream in a single-slot buffer
//! - Optionally tap accepted records for recording
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, MockRecordSource};
//!
//! let mut pipeline = IngestionPipeline::new();
//! pipeline.register_source("cam".into(), Box::new(MockRecordSource::vision("cam", 10.0, 32.5, 0.8, clock)));
//! pipeline.start_all();
//!
//! let bank = pipeline.bank();
//! // at every tick boundary:
//! let snapshot = bank.snapshot();
//! ```

mod adapter;
mod error;
mod generic_adapter;
mod metrics;
mod mock;
mod normalize;
mod pipeline;
mod slot;

// Re-exports
pub use adapter::{RecordAdapter, RecordTap};
pub use error::{IngestionError, Result};
pub use generic_adapter::GenericRecordAdapter;
pub use metrics::{IngestionMetrics, MetricsSnapshot};
pub use mock::{build_record, MockRecordSource};
pub use normalize::{normalize, parse_line};
pub use pipeline::IngestionPipeline;
pub use slot::{LatestSlot, SlotBank, SlotSnapshot};

//! 通用输入适配器
//!
//! 基于 `RecordSource` trait 的统一适配器实现，
//! 让 IngestionPipeline 以同样方式处理 Mock 与真实输入源。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use contracts::{InputRecord, RecordCallback, RecordSource, StreamKind};
use tracing::{debug, trace, warn};

use crate::adapter::{RecordAdapter, RecordTap};
use crate::metrics::IngestionMetrics;
use crate::normalize::normalize;
use crate::slot::SlotBank;

/// Normalize a record and store it; malformed records are logged and dropped.
///
/// Returns `true` if the record reached its slot.
pub(crate) fn deliver(
    source_id: &str,
    record: InputRecord,
    bank: &SlotBank,
    metrics: &IngestionMetrics,
    tap: Option<&RecordTap>,
) -> bool {
    let stream = record.stream().label();
    match normalize(record) {
        Ok(record) => {
            if let Some(tap) = tap {
                tap(&record);
            }
            metrics.record_received(stream);
            if bank.put(record) {
                metrics.record_overwritten(stream);
            }
            trace!(source_id = %source_id, stream, "record stored");
            true
        }
        Err(e) => {
            metrics.record_malformed(stream);
            warn!(source_id = %source_id, stream, error = %e, "dropping malformed record");
            false
        }
    }
}

/// 通用输入适配器
pub struct GenericRecordAdapter {
    source_id: String,
    source: Box<dyn RecordSource>,
    listening: Arc<AtomicBool>,
}

impl GenericRecordAdapter {
    /// 创建新的通用适配器
    pub fn new(source_id: String, source: Box<dyn RecordSource>) -> Self {
        Self {
            source_id,
            source,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl RecordAdapter for GenericRecordAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn stream(&self) -> StreamKind {
        self.source.stream()
    }

    fn start(&self, bank: Arc<SlotBank>, metrics: Arc<IngestionMetrics>, tap: Option<RecordTap>) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let source_id = self.source_id.clone();
        let listening = self.listening.clone();

        debug!(source_id = %source_id, stream = %self.stream(), "starting generic adapter");

        let callback: RecordCallback = Arc::new(move |record| {
            if !listening.load(Ordering::Relaxed) {
                return;
            }
            deliver(&source_id, record, &bank, &metrics, tap.as_ref());
        });

        self.source.listen(callback);
    }

    fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!(source_id = %self.source_id, "stopping generic adapter");
            self.source.stop();
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

//! 单槽缓冲
//!
//! 每个输入流一个槽，生产者覆盖写（最新值胜出），决策循环只在 tick 边界读取。
//! 每个槽只有一个写者和一个读者，一个 Mutex 即可，不需要队列。

use std::sync::{Mutex, MutexGuard};

use contracts::{InputRecord, Observation, OperatorRequest, SourceKind, StreamKind, TelemetryState};

/// Most-recent-wins single value slot.
#[derive(Debug)]
pub struct LatestSlot<T> {
    value: Mutex<Option<T>>,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }
}

impl<T: Clone> LatestSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Option<T>> {
        // A panicking producer must not take the decision loop down with it
        self.value.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the current value. Returns `true` if an unread value was overwritten.
    pub fn put(&self, value: T) -> bool {
        self.guard().replace(value).is_some()
    }

    /// Copy of the current value, left in place.
    pub fn peek(&self) -> Option<T> {
        self.guard().clone()
    }

    /// Remove and return the current value.
    pub fn take(&self) -> Option<T> {
        self.guard().take()
    }

    pub fn clear(&self) {
        self.guard().take();
    }
}

/// What the decision loop sees at one tick boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotSnapshot {
    /// Indexed by [`SourceKind::slot_index`].
    pub observations: [Option<Observation>; 3],
    pub telemetry: Option<TelemetryState>,
    /// Operator requests are consumed by the tick that reads them.
    pub operator: Option<OperatorRequest>,
}

impl SlotSnapshot {
    pub fn observation(&self, source: SourceKind) -> Option<&Observation> {
        source
            .slot_index()
            .and_then(|idx| self.observations[idx].as_ref())
    }
}

/// Fixed arena of slots keyed by stream.
#[derive(Debug, Default)]
pub struct SlotBank {
    observations: [LatestSlot<Observation>; 3],
    telemetry: LatestSlot<TelemetryState>,
    operator: LatestSlot<OperatorRequest>,
}

impl SlotBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record in its stream's slot.
    ///
    /// Returns `true` when an unread value was replaced. Fusion-sourced
    /// observations have no slot and are ignored.
    pub fn put(&self, record: InputRecord) -> bool {
        match record {
            InputRecord::Observation(obs) => match obs.source.slot_index() {
                Some(idx) => self.observations[idx].put(obs),
                None => false,
            },
            InputRecord::Telemetry(state) => self.telemetry.put(state),
            InputRecord::Operator(request) => self.operator.put(request),
        }
    }

    pub fn clear(&self, stream: StreamKind) {
        match stream {
            StreamKind::Telemetry => self.telemetry.clear(),
            StreamKind::Observation(source) => {
                if let Some(idx) = source.slot_index() {
                    self.observations[idx].clear();
                }
            }
            StreamKind::Operator => self.operator.clear(),
        }
    }

    /// Read every slot. Observation and telemetry values stay in place;
    /// the operator request is consumed.
    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            observations: [
                self.observations[0].peek(),
                self.observations[1].peek(),
                self.observations[2].peek(),
            ],
            telemetry: self.telemetry.peek(),
            operator: self.operator.take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{LinkStatus, OperatorAction, RecordTime};
    use rand::seq::SliceRandom;
    use std::sync::Arc;

    fn vision(mono_ms: u64, bearing: f64) -> InputRecord {
        InputRecord::Observation(Observation::ok(
            SourceKind::Vision,
            RecordTime::new(0, mono_ms),
            bearing,
            0.9,
        ))
    }

    #[test]
    fn test_latest_value_wins() {
        let bank = SlotBank::new();
        assert!(!bank.put(vision(10, 1.0)));
        assert!(bank.put(vision(20, 2.0)));

        let snap = bank.snapshot();
        let obs = snap.observation(SourceKind::Vision).unwrap();
        assert_eq!(obs.bearing_deg, Some(2.0));
        assert!(snap.observation(SourceKind::Thermal).is_none());
    }

    #[test]
    fn test_operator_request_consumed_once() {
        let bank = SlotBank::new();
        bank.put(InputRecord::Operator(OperatorRequest::new(
            RecordTime::new(0, 5),
            OperatorAction::Estop,
        )));
        bank.put(InputRecord::Telemetry(TelemetryState::new(
            RecordTime::new(0, 5),
            LinkStatus::Ok,
        )));

        let first = bank.snapshot();
        assert!(first.operator.is_some());
        assert!(first.telemetry.is_some());

        let second = bank.snapshot();
        assert!(second.operator.is_none());
        assert!(second.telemetry.is_some());
    }

    #[test]
    fn test_clear_stream() {
        let bank = SlotBank::new();
        bank.put(vision(10, 1.0));
        bank.clear(StreamKind::Observation(SourceKind::Vision));
        assert!(bank.snapshot().observation(SourceKind::Vision).is_none());
    }

    #[test]
    fn test_fusion_source_has_no_slot() {
        let bank = SlotBank::new();
        let obs = Observation::ok(SourceKind::Fusion, RecordTime::new(0, 1), 3.0, 0.5);
        assert!(!bank.put(InputRecord::Observation(obs)));
        assert!(bank.snapshot().observations.iter().all(Option::is_none));
    }

    #[test]
    fn test_concurrent_writers_leave_one_value() {
        let bank = Arc::new(SlotBank::new());
        let mut order: Vec<u64> = (1..=200).collect();
        order.shuffle(&mut rand::rng());

        let handles: Vec<_> = order
            .chunks(50)
            .map(|chunk| {
                let bank = bank.clone();
                let chunk = chunk.to_vec();
                std::thread::spawn(move || {
                    for mono in chunk {
                        bank.put(vision(mono, mono as f64));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = bank.snapshot();
        let obs = snap.observation(SourceKind::Vision).unwrap();
        assert_eq!(obs.bearing_deg, Some(obs.time.mono_ms as f64));
    }
}

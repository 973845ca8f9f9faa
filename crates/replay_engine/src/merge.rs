//! StreamMerger - k 路归并
//!
//! 每个游标只在堆中保留一个头记录，键为 `(mono_ms, StreamKind)`，
//! 时间相同时按固定流顺序出队：telemetry, vision, thermal, audio, operator。

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use contracts::{EndOfStreamPolicy, InputRecord, RecordTime, RunLayout, StreamKind};
use tracing::{debug, info};

use crate::cursor::{StreamCursor, StreamStats};
use crate::error::{ReplayError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct HeadKey {
    mono_ms: u64,
    stream: StreamKind,
    slot: usize,
}

/// Merges recorded streams into one time-ordered sequence.
#[derive(Debug)]
pub struct StreamMerger {
    cursors: Vec<StreamCursor>,
    heads: Vec<Option<InputRecord>>,
    heap: BinaryHeap<Reverse<HeadKey>>,
    policy: EndOfStreamPolicy,
    finished: bool,
}

impl StreamMerger {
    /// Prime every cursor and build the heap.
    pub fn new(mut cursors: Vec<StreamCursor>, policy: EndOfStreamPolicy) -> Result<Self> {
        cursors.sort_by_key(|c| c.stream());

        let mut heads = Vec::with_capacity(cursors.len());
        let mut heap = BinaryHeap::with_capacity(cursors.len());
        for (slot, cursor) in cursors.iter_mut().enumerate() {
            let head = cursor.next_record()?;
            if let Some(record) = &head {
                heap.push(Reverse(HeadKey {
                    mono_ms: record.time().mono_ms,
                    stream: cursor.stream(),
                    slot,
                }));
            } else {
                debug!(stream = %cursor.stream(), "replay stream is empty");
            }
            heads.push(head);
        }

        Ok(Self {
            cursors,
            heads,
            heap,
            policy,
            finished: false,
        })
    }

    /// Open every stream present in a run directory.
    pub fn open(layout: &RunLayout, policy: EndOfStreamPolicy) -> Result<Self> {
        if !layout.root().is_dir() {
            return Err(ReplayError::RunNotFound(layout.root().to_path_buf()));
        }

        let mut cursors = Vec::new();
        for stream in StreamKind::ALL {
            if let Some(path) = layout.existing_stream(stream) {
                cursors.push(StreamCursor::open(stream, &path)?);
            }
        }
        if cursors.is_empty() {
            return Err(ReplayError::NoStreams(layout.root().to_path_buf()));
        }

        info!(
            run = %layout.root().display(),
            streams = cursors.len(),
            policy = ?policy,
            "opened run for replay"
        );
        Self::new(cursors, policy)
    }

    /// Time of the next record, if any.
    pub fn peek_time(&self) -> Option<RecordTime> {
        if self.finished {
            return None;
        }
        let Reverse(key) = self.heap.peek()?;
        self.heads[key.slot].as_ref().map(InputRecord::time)
    }

    pub fn is_finished(&self) -> bool {
        self.finished || self.heap.is_empty()
    }

    /// Pop the next record in merged order.
    pub fn next_record(&mut self) -> Result<Option<InputRecord>> {
        if self.finished {
            return Ok(None);
        }
        let Some(Reverse(key)) = self.heap.pop() else {
            return Ok(None);
        };

        let record = self.heads[key.slot].take();
        let cursor = &mut self.cursors[key.slot];
        match cursor.next_record()? {
            Some(next) => {
                self.heap.push(Reverse(HeadKey {
                    mono_ms: next.time().mono_ms,
                    stream: key.stream,
                    slot: key.slot,
                }));
                self.heads[key.slot] = Some(next);
            }
            None => {
                debug!(stream = %key.stream, records = cursor.stats().records, "replay stream exhausted");
                if self.policy == EndOfStreamPolicy::Stop {
                    info!(stream = %key.stream, "end of stream reached, stopping replay");
                    self.finished = true;
                }
            }
        }
        Ok(record)
    }

    /// Pop the next record only if it is at or before `mono_ms`.
    pub fn next_until(&mut self, mono_ms: u64) -> Result<Option<InputRecord>> {
        match self.peek_time() {
            Some(t) if t.mono_ms <= mono_ms => self.next_record(),
            _ => Ok(None),
        }
    }

    /// Read statistics per stream, in stream order.
    pub fn stats(&self) -> Vec<(StreamKind, StreamStats)> {
        self.cursors
            .iter()
            .map(|c| (c.stream(), c.stats().clone()))
            .collect()
    }
}

impl Iterator for StreamMerger {
    type Item = Result<InputRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SourceKind;
    use std::fs;
    use std::path::Path;

    fn write(path: &Path, lines: &[String]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, lines.join("\n") + "\n").unwrap();
    }

    fn telemetry(mono: u64) -> String {
        format!(r#"{{"time":{{"epoch_ms":0,"mono_ms":{mono}}},"link_status":"OK"}}"#)
    }

    fn obs(mono: u64, bearing: f64) -> String {
        format!(r#"{{"time":{{"epoch_ms":0,"mono_ms":{mono}}},"bearing_deg":{bearing},"confidence":0.7,"status":"OK"}}"#)
    }

    fn run_dir() -> (tempfile::TempDir, RunLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        write(&layout.telemetry(), &[telemetry(0), telemetry(100), telemetry(200)]);
        write(
            &layout.observation(SourceKind::Vision),
            &[obs(100, 1.0), obs(150, 2.0)],
        );
        write(&layout.observation(SourceKind::Audio), &[obs(100, 3.0)]);
        (dir, layout)
    }

    fn order(merger: StreamMerger) -> Vec<(u64, StreamKind)> {
        merger
            .map(|r| {
                let r = r.unwrap();
                (r.time().mono_ms, r.stream())
            })
            .collect()
    }

    #[test]
    fn test_merge_order_with_ties() {
        let (_dir, layout) = run_dir();
        let merger = StreamMerger::open(&layout, EndOfStreamPolicy::HoldLast).unwrap();
        let vision = StreamKind::Observation(SourceKind::Vision);
        let audio = StreamKind::Observation(SourceKind::Audio);
        assert_eq!(
            order(merger),
            vec![
                (0, StreamKind::Telemetry),
                (100, StreamKind::Telemetry),
                (100, vision),
                (100, audio),
                (150, vision),
                (200, StreamKind::Telemetry),
            ]
        );
    }

    #[test]
    fn test_stop_policy_ends_at_first_exhausted() {
        let (_dir, layout) = run_dir();
        let merger = StreamMerger::open(&layout, EndOfStreamPolicy::Stop).unwrap();
        // audio runs out at its only record
        assert_eq!(order(merger).len(), 4);
    }

    #[test]
    fn test_next_until() {
        let (_dir, layout) = run_dir();
        let mut merger = StreamMerger::open(&layout, EndOfStreamPolicy::HoldLast).unwrap();
        let mut applied = 0;
        while merger.next_until(100).unwrap().is_some() {
            applied += 1;
        }
        assert_eq!(applied, 4);
        assert_eq!(merger.peek_time().map(|t| t.mono_ms), Some(150));
        assert!(!merger.is_finished());
    }

    #[test]
    fn test_open_errors() {
        let err = StreamMerger::open(&RunLayout::new("/nonexistent/run"), EndOfStreamPolicy::Stop).unwrap_err();
        assert!(matches!(err, ReplayError::RunNotFound(_)));

        let dir = tempfile::tempdir().unwrap();
        let err = StreamMerger::open(&RunLayout::new(dir.path()), EndOfStreamPolicy::Stop).unwrap_err();
        assert!(matches!(err, ReplayError::NoStreams(_)));
    }

    #[test]
    fn test_nested_telemetry_layout() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        write(&dir.path().join("telemetry").join("telemetry.jsonl"), &[telemetry(5)]);
        let merger = StreamMerger::open(&layout, EndOfStreamPolicy::HoldLast).unwrap();
        assert_eq!(order(merger), vec![(5, StreamKind::Telemetry)]);
    }
}

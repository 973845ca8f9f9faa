//! StreamCursor - 单个录制流的惰性读取

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use contracts::{InputRecord, StreamKind};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ReplayError, Result};

/// Per-stream read statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    /// Records accepted
    pub records: u64,
    /// Lines that failed to parse or normalize
    pub malformed: u64,
    /// Records dropped for going backwards in time
    pub out_of_order: u64,
    pub first_mono: Option<u64>,
    pub last_mono: Option<u64>,
}

/// Reads one recorded stream line by line.
///
/// Accepted records are non-decreasing in `mono_ms`.
pub struct StreamCursor {
    stream: StreamKind,
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: u64,
    stats: StreamStats,
}

impl std::fmt::Debug for StreamCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCursor")
            .field("stream", &self.stream)
            .field("path", &self.path)
            .field("line_no", &self.line_no)
            .field("stats", &self.stats)
            .finish()
    }
}

impl StreamCursor {
    pub fn open(stream: StreamKind, path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ReplayError::io(path, e))?;
        debug!(stream = %stream, path = %path.display(), "opened replay stream");
        Ok(Self {
            stream,
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
            stats: StreamStats::default(),
        })
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Next valid record, or `None` at end of file.
    pub fn next_record(&mut self) -> Result<Option<InputRecord>> {
        for line in self.lines.by_ref() {
            let line = line.map_err(|e| ReplayError::io(&self.path, e))?;
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let record = match ingestion::parse_line(self.stream, &line) {
                Ok(record) if record.stream() == self.stream => record,
                Ok(record) => {
                    let message = format!("record belongs to {}", record.stream());
                    drop_line(self.stream, self.line_no, "stream_mismatch", &message);
                    self.stats.malformed += 1;
                    continue;
                }
                Err(e) => {
                    drop_line(self.stream, self.line_no, "malformed", &e.to_string());
                    self.stats.malformed += 1;
                    continue;
                }
            };

            let mono = record.time().mono_ms;
            if self.stats.last_mono.is_some_and(|last| mono < last) {
                let message = format!("mono_ms {mono} goes backwards");
                drop_line(self.stream, self.line_no, "out_of_order", &message);
                self.stats.out_of_order += 1;
                continue;
            }

            self.stats.records += 1;
            self.stats.first_mono.get_or_insert(mono);
            self.stats.last_mono = Some(mono);
            metrics::counter!("replay_records_total", "stream" => self.stream.label()).increment(1);
            return Ok(Some(record));
        }
        Ok(None)
    }
}

/// Not a method: `next_record` is still borrowing the line iterator.
fn drop_line(stream: StreamKind, line_no: u64, reason: &'static str, message: &str) {
    warn!(
        stream = %stream,
        line = line_no,
        reason,
        message,
        "dropping replay record"
    );
    metrics::counter!(
        "replay_records_dropped_total",
        "stream" => stream.label(),
        "reason" => reason
    )
    .increment(1);
}

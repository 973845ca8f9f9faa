//! TickSchedule - 录制的 tick 时间表
//!
//! live 运行的 tick 相位由墙钟决定，回放按 `ticks.jsonl` 重放同样的
//! tick 时间，缺失时由调用方退回 `origin + k × tick_ms`。

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use contracts::{RecordTime, RunLayout, TickMark};
use tracing::{debug, warn};

use crate::error::{ReplayError, Result};

/// Lazy reader over a run's `ticks.jsonl`.
pub struct TickSchedule {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: u64,
    last_mono: Option<u64>,
    peeked: Option<TickMark>,
    dropped: u64,
}

impl std::fmt::Debug for TickSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickSchedule")
            .field("path", &self.path)
            .field("line_no", &self.line_no)
            .field("dropped", &self.dropped)
            .finish()
    }
}

impl TickSchedule {
    /// `None` when the run has no recorded schedule.
    pub fn open(layout: &RunLayout) -> Result<Option<Self>> {
        let path = layout.ticks();
        if !path.is_file() {
            return Ok(None);
        }
        Self::from_path(&path).map(Some)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ReplayError::io(path, e))?;
        debug!(path = %path.display(), "opened tick schedule");
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
            last_mono: None,
            peeked: None,
            dropped: 0,
        })
    }

    /// Lines dropped as malformed or out of order.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Time of the next mark without consuming it.
    pub fn peek_time(&mut self) -> Result<Option<RecordTime>> {
        if self.peeked.is_none() {
            self.peeked = self.read_mark()?;
        }
        Ok(self.peeked.as_ref().map(|mark| mark.time))
    }

    /// Next mark, or `None` at end of file.
    pub fn next_mark(&mut self) -> Result<Option<TickMark>> {
        match self.peeked.take() {
            Some(mark) => Ok(Some(mark)),
            None => self.read_mark(),
        }
    }

    fn read_mark(&mut self) -> Result<Option<TickMark>> {
        for line in self.lines.by_ref() {
            let line = line.map_err(|e| ReplayError::io(&self.path, e))?;
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let mark: TickMark = match serde_json::from_str(&line) {
                Ok(mark) => mark,
                Err(e) => {
                    warn!(line = self.line_no, error = %e, "dropping malformed tick mark");
                    self.dropped += 1;
                    continue;
                }
            };
            if self.last_mono.is_some_and(|last| mark.time.mono_ms < last) {
                warn!(line = self.line_no, mono_ms = mark.time.mono_ms, "dropping tick mark that goes backwards");
                self.dropped += 1;
                continue;
            }
            self.last_mono = Some(mark.time.mono_ms);
            return Ok(Some(mark));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_schedule_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TickSchedule::open(&RunLayout::new(dir.path())).unwrap().is_none());
    }

    #[test]
    fn test_reads_marks_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        let t = |mono| RecordTime::new(0, mono);
        let lines = [
            serde_json::to_string(&TickMark::tick(t(10_040), 0, None)).unwrap(),
            "{oops".to_string(),
            serde_json::to_string(&TickMark::tick(t(10_140), 1, Some(130))).unwrap(),
            serde_json::to_string(&TickMark::tick(t(9_000), 2, None)).unwrap(),
            serde_json::to_string(&TickMark::stop(t(10_340), 2, "run complete")).unwrap(),
        ];
        fs::write(layout.ticks(), lines.join("\n")).unwrap();

        let mut schedule = TickSchedule::open(&layout).unwrap().unwrap();
        assert_eq!(schedule.peek_time().unwrap(), Some(t(10_040)));
        let mut marks = Vec::new();
        while let Some(mark) = schedule.next_mark().unwrap() {
            marks.push(mark);
        }
        assert_eq!(marks.len(), 3);
        assert_eq!(marks[0].time.mono_ms, 10_040);
        assert_eq!(marks[1].late_ms, Some(130));
        assert!(marks[2].is_stop());
        assert_eq!(schedule.dropped(), 2);
    }
}

//! RunLayout - 运行目录布局
//!
//! ```text
//! <run_dir>/
//!   run_meta.json
//!   events.jsonl
//!   commands.jsonl
//!   fused.jsonl
//!   ticks.jsonl                (tick 时间表)
//!   telemetry.jsonl            (或 telemetry/telemetry.jsonl)
//!   operator.jsonl             (可选)
//!   observations/<source>.jsonl
//! ```

use std::path::{Path, PathBuf};

use crate::{SourceKind, StreamKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> PathBuf {
        self.root.join("run_meta.json")
    }

    pub fn events(&self) -> PathBuf {
        self.root.join("events.jsonl")
    }

    pub fn commands(&self) -> PathBuf {
        self.root.join("commands.jsonl")
    }

    pub fn fused(&self) -> PathBuf {
        self.root.join("fused.jsonl")
    }

    /// Decision-loop tick schedule.
    pub fn ticks(&self) -> PathBuf {
        self.root.join("ticks.jsonl")
    }

    pub fn observations_dir(&self) -> PathBuf {
        self.root.join("observations")
    }

    pub fn observation(&self, source: SourceKind) -> PathBuf {
        self.observations_dir().join(format!("{}.jsonl", source.as_str()))
    }

    /// Telemetry path for writing.
    pub fn telemetry(&self) -> PathBuf {
        self.root.join("telemetry.jsonl")
    }

    pub fn operator(&self) -> PathBuf {
        self.root.join("operator.jsonl")
    }

    /// Path to read a stream from, if it exists.
    ///
    /// Telemetry falls back to the nested `telemetry/telemetry.jsonl` layout.
    pub fn existing_stream(&self, stream: StreamKind) -> Option<PathBuf> {
        let candidates = match stream {
            StreamKind::Telemetry => vec![
                self.telemetry(),
                self.root.join("telemetry").join("telemetry.jsonl"),
            ],
            StreamKind::Observation(source) => vec![self.observation(source)],
            StreamKind::Operator => vec![self.operator()],
        };
        candidates.into_iter().find(|p| p.is_file())
    }

    /// Path to record a stream into.
    pub fn stream_path(&self, stream: StreamKind) -> PathBuf {
        match stream {
            StreamKind::Telemetry => self.telemetry(),
            StreamKind::Observation(source) => self.observation(source),
            StreamKind::Operator => self.operator(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = RunLayout::new("/tmp/run1");
        assert_eq!(layout.commands(), PathBuf::from("/tmp/run1/commands.jsonl"));
        assert_eq!(
            layout.observation(SourceKind::Audio),
            PathBuf::from("/tmp/run1/observations/audio.jsonl")
        );
        assert_eq!(
            layout.stream_path(StreamKind::Operator),
            PathBuf::from("/tmp/run1/operator.jsonl")
        );
    }

    #[test]
    fn test_missing_stream_is_none() {
        let layout = RunLayout::new("/nonexistent/run");
        assert!(layout.existing_stream(StreamKind::Telemetry).is_none());
    }
}

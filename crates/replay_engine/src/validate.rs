//! 运行目录校验

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use contracts::{RunLayout, SourceKind, StreamKind};
use serde::Serialize;
use tracing::{info, instrument};

use crate::cursor::{StreamCursor, StreamStats};
use crate::error::{ReplayError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub stream: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub stats: StreamStats,
}

/// Result of [`validate_run`].
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub streams: Vec<StreamReport>,
    /// Files a replay cannot do without
    pub missing_required: Vec<PathBuf>,
    /// Files a complete run normally has
    pub missing_optional: Vec<PathBuf>,
}

impl RunReport {
    /// Missing required files or backwards records always fail; `strict`
    /// also fails on malformed lines and missing optional files.
    pub fn is_valid(&self, strict: bool) -> bool {
        if !self.missing_required.is_empty() {
            return false;
        }
        if self.streams.iter().any(|s| s.stats.out_of_order > 0) {
            return false;
        }
        if strict {
            return self.missing_optional.is_empty() && self.streams.iter().all(|s| s.stats.malformed == 0);
        }
        true
    }

    pub fn total_records(&self) -> u64 {
        self.streams.iter().map(|s| s.stats.records).sum()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run: {}", self.root.display())?;
        for s in &self.streams {
            writeln!(
                f,
                "  {:<10} records={:<6} malformed={:<4} monotonic_violations={:<4} span={}",
                s.stream,
                s.stats.records,
                s.stats.malformed,
                s.stats.out_of_order,
                match (s.stats.first_mono, s.stats.last_mono) {
                    (Some(a), Some(b)) => format!("{a}..{b} ms"),
                    _ => "-".to_string(),
                }
            )?;
        }
        for path in &self.missing_required {
            writeln!(f, "  missing required: {}", path.display())?;
        }
        for path in &self.missing_optional {
            writeln!(f, "  missing optional: {}", path.display())?;
        }
        Ok(())
    }
}

/// Read every stream of a run and report counts and problems.
#[instrument(name = "validate_run", skip_all, fields(run = %root.display()))]
pub fn validate_run(root: &Path) -> Result<RunReport> {
    if !root.is_dir() {
        return Err(ReplayError::RunNotFound(root.to_path_buf()));
    }
    let layout = RunLayout::new(root);

    let mut streams = Vec::new();
    let mut missing_required = Vec::new();
    let mut missing_optional = Vec::new();

    for stream in StreamKind::ALL {
        match layout.existing_stream(stream) {
            Some(path) => {
                let mut cursor = StreamCursor::open(stream, &path)?;
                while cursor.next_record()?.is_some() {}
                streams.push(StreamReport {
                    stream: stream.label().to_string(),
                    path,
                    stats: cursor.stats().clone(),
                });
            }
            None if stream == StreamKind::Telemetry => missing_required.push(layout.telemetry()),
            None => {}
        }
    }

    let has_observations = streams
        .iter()
        .any(|s| SourceKind::OBSERVED.iter().any(|src| src.as_str() == s.stream));
    if !has_observations {
        missing_required.push(layout.observations_dir());
    }

    for path in [layout.meta(), layout.events(), layout.commands(), layout.ticks()] {
        if !path.is_file() {
            missing_optional.push(path);
        }
    }

    let report = RunReport {
        root: root.to_path_buf(),
        streams,
        missing_required,
        missing_optional,
    };
    info!(
        records = report.total_records(),
        missing_required = report.missing_required.len(),
        "run validated"
    );
    Ok(report)
}

/// Resolve a run argument: `latest`, an existing path, or a run id under `runs_root`.
///
/// Run ids start with a sortable timestamp, so `latest` is the greatest name.
pub fn resolve_run_dir(runs_root: &Path, run: &str) -> Result<PathBuf> {
    if run == "latest" {
        let entries = fs::read_dir(runs_root).map_err(|e| ReplayError::io(runs_root, e))?;
        return entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .max()
            .ok_or_else(|| ReplayError::RunNotFound(runs_root.join("latest")));
    }

    let direct = PathBuf::from(run);
    if direct.is_dir() {
        return Ok(direct);
    }
    let nested = runs_root.join(run);
    if nested.is_dir() {
        Ok(nested)
    } else {
        Err(ReplayError::RunNotFound(direct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_complete_run_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        write(&layout.telemetry(), "{\"mono_ms\":1,\"link_status\":\"OK\"}\n");
        write(
            &layout.observation(SourceKind::Vision),
            "{\"mono_ms\":1,\"bearing_deg\":1.0,\"confidence\":0.5,\"status\":\"OK\"}\nnot json\n",
        );
        write(&layout.meta(), "{}");
        write(&layout.events(), "");
        write(&layout.commands(), "");
        write(&layout.ticks(), "");

        let report = validate_run(dir.path()).unwrap();
        assert_eq!(report.total_records(), 2);
        assert!(report.missing_optional.is_empty());
        assert!(report.is_valid(false));
        // the malformed line fails strict mode
        assert!(!report.is_valid(true));
        assert!(report.to_string().contains("vision"));
    }

    #[test]
    fn test_missing_required() {
        let dir = tempfile::tempdir().unwrap();
        let report = validate_run(dir.path()).unwrap();
        assert_eq!(report.missing_required.len(), 2);
        assert_eq!(report.missing_optional.len(), 4);
        assert!(report.missing_optional.contains(&RunLayout::new(dir.path()).ticks()));
        assert!(!report.is_valid(false));
    }

    #[test]
    fn test_monotonic_violation_fails() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        write(
            &layout.telemetry(),
            "{\"mono_ms\":10,\"link_status\":\"OK\"}\n{\"mono_ms\":5,\"link_status\":\"OK\"}\n",
        );
        write(
            &layout.observation(SourceKind::Audio),
            "{\"mono_ms\":1,\"bearing_deg\":null,\"confidence\":null,\"status\":\"NO_SIGNAL\"}\n",
        );
        let report = validate_run(dir.path()).unwrap();
        assert_eq!(report.streams[0].stats.out_of_order, 1);
        assert!(!report.is_valid(false));
    }

    #[test]
    fn test_resolve_latest() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("20240101_000000_aaaaaaaa")).unwrap();
        fs::create_dir(dir.path().join("20250101_000000_bbbbbbbb")).unwrap();
        let latest = resolve_run_dir(dir.path(), "latest").unwrap();
        assert!(latest.ends_with("20250101_000000_bbbbbbbb"));

        let by_id = resolve_run_dir(dir.path(), "20240101_000000_aaaaaaaa").unwrap();
        assert!(by_id.ends_with("20240101_000000_aaaaaaaa"));
        assert!(resolve_run_dir(dir.path(), "nope").is_err());
    }
}

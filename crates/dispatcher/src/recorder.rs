//! 运行目录与审计记录
//!
//! 每次运行（live 或 replay）写入一个独立目录：`run_meta.json`、
//! `events.jsonl`、`commands.jsonl`（gate 审计）、`fused.jsonl`、
//! `ticks.jsonl`（tick 时间表），
//! live 模式还可以录制输入流，供之后回放。

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::fs::{self, File};
use std::hash::BuildHasher;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local, Utc};
use contracts::{Event, FusedObservation, InputRecord, RunLayout, StreamKind, TickMark, SCHEMA_VERSION};
use safety_gate::AuditEntry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::DispatcherError;

/// `YYYYmmdd_HHMMSS_<8 hex>`; sorts by creation time.
pub fn new_run_id(now: DateTime<Local>) -> String {
    let salt = RandomState::new().hash_one(now.timestamp_nanos_opt().unwrap_or_default());
    format!("{}_{:08x}", now.format("%Y%m%d_%H%M%S"), salt as u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Live,
    Replay,
}

/// Contents of `run_meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub version: String,
    pub run_id: String,
    pub mode: RunMode,
    pub created_at: DateTime<Utc>,
    /// Recorded run this replay was produced from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_run: Option<PathBuf>,
    /// Effective configuration
    pub config: serde_json::Value,
}

impl RunMeta {
    pub fn new(run_id: impl Into<String>, mode: RunMode, config: serde_json::Value) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            run_id: run_id.into(),
            mode,
            created_at: Utc::now(),
            source_run: None,
            config,
        }
    }

    pub fn with_source_run(mut self, source: impl Into<PathBuf>) -> Self {
        self.source_run = Some(source.into());
        self
    }
}

/// One run directory, passed explicitly to everything that writes into it.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: String,
    layout: RunLayout,
}

impl RunContext {
    /// Create a fresh `<runs_root>/<run_id>/`.
    #[instrument(name = "run_context_create", skip_all, fields(runs_root = %runs_root.display()))]
    pub fn create(runs_root: &Path) -> Result<Self, DispatcherError> {
        let run_id = new_run_id(Local::now());
        let ctx = Self::at(runs_root.join(&run_id))?;
        info!(run_id = %ctx.run_id, root = %ctx.root().display(), "run directory created");
        Ok(ctx)
    }

    /// Use `dir` as the run directory, creating it if needed.
    pub fn at(dir: impl Into<PathBuf>) -> Result<Self, DispatcherError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| DispatcherError::run_directory(&dir, e))?;
        let run_id = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| new_run_id(Local::now()));
        Ok(Self {
            run_id,
            layout: RunLayout::new(dir),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn write_meta(&self, meta: &RunMeta) -> Result<(), DispatcherError> {
        let path = self.layout.meta();
        let json = serde_json::to_vec_pretty(meta)?;
        fs::write(&path, json).map_err(|e| DispatcherError::run_directory(&path, e))
    }
}

/// Buffered JSON-lines writer. Flushes on drop.
#[derive(Debug)]
pub struct JsonlWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    lines: u64,
}

impl JsonlWriter {
    /// Create (or truncate) `path`, creating parent directories.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, DispatcherError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| DispatcherError::run_directory(parent, e))?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            lines: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<(), DispatcherError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(contracts::ContractError::sink_write(self.path.display().to_string(), "writer is closed").into());
        };
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), DispatcherError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Flush and release the file. Later appends fail.
    pub fn close(&mut self) -> Result<(), DispatcherError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Writes the audit files of a run.
#[derive(Debug)]
pub struct RunRecorder {
    events: JsonlWriter,
    commands: JsonlWriter,
    fused: JsonlWriter,
    ticks: JsonlWriter,
}

impl RunRecorder {
    pub fn open(ctx: &RunContext) -> Result<Self, DispatcherError> {
        let layout = ctx.layout();
        Ok(Self {
            events: JsonlWriter::create(layout.events())?,
            commands: JsonlWriter::create(layout.commands())?,
            fused: JsonlWriter::create(layout.fused())?,
            ticks: JsonlWriter::create(layout.ticks())?,
        })
    }

    pub fn record_event(&mut self, event: &Event) -> Result<(), DispatcherError> {
        self.events.append(event)
    }

    pub fn record_audit(&mut self, entry: &AuditEntry) -> Result<(), DispatcherError> {
        self.commands.append(entry)
    }

    pub fn record_fused(&mut self, fused: &FusedObservation) -> Result<(), DispatcherError> {
        self.fused.append(fused)
    }

    pub fn record_tick(&mut self, mark: &TickMark) -> Result<(), DispatcherError> {
        self.ticks.append(mark)
    }

    /// (events, audit entries, fused) written so far
    pub fn counts(&self) -> (u64, u64, u64) {
        (self.events.lines(), self.commands.lines(), self.fused.lines())
    }

    pub fn flush(&mut self) -> Result<(), DispatcherError> {
        self.events.flush()?;
        self.commands.flush()?;
        self.fused.flush()?;
        self.ticks.flush()
    }

    pub fn close(&mut self) -> Result<(), DispatcherError> {
        let (events, audits, fused) = self.counts();
        self.events.close()?;
        self.commands.close()?;
        self.fused.close()?;
        self.ticks.close()?;
        debug!(events, audits, fused, ticks = self.ticks.lines(), "run recorder closed");
        Ok(())
    }
}

/// Records accepted live inputs into the run layout so the run can be replayed.
///
/// Called from producer threads, hence the mutex.
#[derive(Debug)]
pub struct InputRecorder {
    layout: RunLayout,
    writers: Mutex<HashMap<StreamKind, JsonlWriter>>,
}

impl InputRecorder {
    pub fn new(ctx: &RunContext) -> Self {
        Self {
            layout: ctx.layout().clone(),
            writers: Mutex::new(HashMap::new()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<StreamKind, JsonlWriter>> {
        self.writers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, record: &InputRecord) -> Result<(), DispatcherError> {
        let stream = record.stream();
        let mut writers = self.guard();
        let writer = match writers.entry(stream) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let writer = JsonlWriter::create(self.layout.stream_path(stream))?;
                debug!(stream = %stream, path = %writer.path().display(), "recording input stream");
                entry.insert(writer)
            }
        };
        match record {
            InputRecord::Telemetry(t) => writer.append(t),
            InputRecord::Observation(o) => writer.append(o),
            InputRecord::Operator(r) => writer.append(r),
        }
    }

    pub fn close(&self) {
        for (stream, writer) in self.guard().iter_mut() {
            if let Err(e) = writer.close() {
                warn!(stream = %stream, error = %e, "failed to close input recording");
            }
        }
    }
}

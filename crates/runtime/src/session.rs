//! Session - 一次运行的装配与收尾
//!
//! 运行目录、审计记录、命令分发与决策循环在这里组装；
//! 结束时发出最终 STOP，关闭文件，并等待 dispatcher 排空队列。

use std::path::PathBuf;
use std::time::Duration;

use contracts::{AutonomyBlueprint, RecordTime, StreamKind};
use dispatcher::{create_dispatcher, MetricsSnapshot, RunContext, RunMeta, RunRecorder};
use observability::RunSummary;
use replay_engine::StreamStats;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::decision::DecisionLoop;
use crate::error::Result;

/// Capacity of the loop → dispatcher channel
const DISPATCH_QUEUE: usize = 256;

/// How long to wait for sinks to drain on shutdown
pub(crate) const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub summary: RunSummary,
    /// Final per-sink metrics
    pub sinks: Vec<(String, MetricsSnapshot)>,
    /// Ended by a shutdown signal
    pub interrupted: bool,
    /// Per-stream read statistics; empty for live runs
    pub streams: Vec<(StreamKind, StreamStats)>,
}

pub(crate) struct Session {
    pub(crate) ctx: RunContext,
    pub(crate) decision: DecisionLoop,
    dispatcher: JoinHandle<Vec<(String, MetricsSnapshot)>>,
}

impl Session {
    pub(crate) async fn open(blueprint: &AutonomyBlueprint, ctx: RunContext, meta: RunMeta) -> Result<Self> {
        ctx.write_meta(&meta)?;
        let recorder = RunRecorder::open(&ctx)?;

        if blueprint.sinks.is_empty() {
            warn!("no sinks configured, commands are only audited");
        }
        let (tx, rx) = mpsc::channel(DISPATCH_QUEUE);
        let dispatcher = create_dispatcher(blueprint.sinks.clone(), rx).await?.spawn();

        info!(
            run_id = %ctx.run_id(),
            run_dir = %ctx.root().display(),
            mode = ?meta.mode,
            sinks = blueprint.sinks.len(),
            "session opened"
        );

        Ok(Self {
            ctx,
            decision: DecisionLoop::new(blueprint, recorder, tx),
            dispatcher,
        })
    }

    /// Emit the final STOP at `at`, close the run files and drain the sinks.
    pub(crate) async fn close(
        self,
        at: RecordTime,
        reason: &str,
        interrupted: bool,
        streams: Vec<(StreamKind, StreamStats)>,
    ) -> Result<RunOutcome> {
        let Session {
            ctx,
            decision,
            dispatcher,
        } = self;

        let summary = decision.finish(at, reason)?;

        let sinks = match tokio::time::timeout(DRAIN_TIMEOUT, dispatcher).await {
            Ok(joined) => joined?,
            Err(_) => {
                warn!(timeout_secs = DRAIN_TIMEOUT.as_secs(), "sinks did not drain in time");
                Vec::new()
            }
        };

        info!(run_id = %ctx.run_id(), interrupted, "session closed");
        Ok(RunOutcome {
            run_id: ctx.run_id().to_string(),
            run_dir: ctx.root().to_path_buf(),
            summary,
            sinks,
            interrupted,
            streams,
        })
    }
}

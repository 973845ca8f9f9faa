//! Replay 驱动
//!
//! 源运行带有 `ticks.jsonl` 时，按录制的 tick 时间逐个重放（含超时事件与
//! 停止原因），否则 tick 时间为 `first_mono + k × tick_ms`。每个 tick 之前，
//! 先把 `mono_ms ≤ tick` 的记录写入槽，再按 live 的方式执行一次 tick。
//! 倍速只影响等待多久，不影响任何输出。

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use contracts::{AutonomyBlueprint, Clock, ManualClock, RecordTime, RunLayout};
use dispatcher::{RunContext, RunMeta, RunMode};
use ingestion::SlotBank;
use replay_engine::{Pacer, StreamMerger, TickSchedule};
use tracing::{debug, info, instrument, warn};

use crate::decision::DecisionLoop;
use crate::error::{Result, RuntimeError};
use crate::session::{RunOutcome, Session};

/// Stop mark recorded by the source run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStop {
    pub at: RecordTime,
    pub reason: String,
}

/// Where a replay stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayEnd {
    /// Record time of the last tick
    pub at: RecordTime,
    pub ticks: u64,
    /// Ended by a shutdown signal
    pub interrupted: bool,
    /// Set when the tick schedule ran through to its stop mark
    pub recorded_stop: Option<RecordedStop>,
}

/// Drives a [`DecisionLoop`] from merged recorded streams.
pub struct ReplayDriver {
    merger: StreamMerger,
    schedule: Option<TickSchedule>,
    tick_ms: u64,
    speed: f64,
    clock: Arc<ManualClock>,
    bank: SlotBank,
}

impl ReplayDriver {
    pub fn new(merger: StreamMerger, tick_ms: u64, speed: f64) -> Self {
        Self {
            merger,
            schedule: None,
            tick_ms: tick_ms.max(1),
            speed,
            clock: Arc::new(ManualClock::default()),
            bank: SlotBank::new(),
        }
    }

    /// Tick at the recorded times instead of a fixed grid.
    pub fn with_schedule(mut self, schedule: TickSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Replay clock; only advances with tick times.
    pub fn clock(&self) -> Arc<ManualClock> {
        Arc::clone(&self.clock)
    }

    pub fn merger(&self) -> &StreamMerger {
        &self.merger
    }

    fn origin(&mut self) -> Result<Option<RecordTime>> {
        let first_record = self.merger.peek_time();
        let first_tick = match self.schedule.as_mut() {
            Some(schedule) => schedule.peek_time()?,
            None => None,
        };
        Ok(match (first_record, first_tick) {
            (Some(a), Some(b)) => Some(if b.mono_ms < a.mono_ms { b } else { a }),
            (a, b) => a.or(b),
        })
    }

    #[instrument(name = "replay_driver", skip_all, fields(tick_ms = self.tick_ms, speed = self.speed))]
    pub async fn run<F>(&mut self, decision: &mut DecisionLoop, shutdown: F) -> Result<ReplayEnd>
    where
        F: Future<Output = ()>,
    {
        let Some(origin) = self.origin()? else {
            info!("nothing to replay");
            return Ok(ReplayEnd {
                at: self.clock.now(),
                ticks: 0,
                interrupted: false,
                recorded_stop: None,
            });
        };
        let pacer = Pacer::new(self.speed, origin.mono_ms)?;
        tokio::pin!(shutdown);

        let mut ticks = 0u64;
        let mut applied = 0u64;
        let mut last_tick: Option<RecordTime> = None;
        let mut recorded_stop = None;
        let interrupted = loop {
            let mark = match self.schedule.as_mut() {
                Some(schedule) => schedule.next_mark()?,
                None => None,
            };
            let (now, late_ms) = match mark {
                Some(mark) if mark.is_stop() => {
                    recorded_stop = Some(RecordedStop {
                        at: mark.time,
                        reason: mark.stop_reason.unwrap_or_default(),
                    });
                    break false;
                }
                Some(mark) => (mark.time, mark.late_ms),
                None => {
                    if let Some(schedule) = self.schedule.take() {
                        warn!(dropped = schedule.dropped(), "tick schedule ended without a stop mark");
                        if self.merger.is_finished() {
                            break false;
                        }
                    }
                    (last_tick.map_or(origin, |t| t.advanced_by(self.tick_ms)), None)
                }
            };

            while let Some(record) = self.merger.next_until(now.mono_ms)? {
                self.bank.put(record);
                applied += 1;
            }

            let stop = tokio::select! {
                biased;
                _ = &mut shutdown => true,
                _ = pace(&pacer, now.mono_ms) => false,
            };
            if stop {
                break true;
            }

            if let Some(late_ms) = late_ms {
                decision.record_overrun(now, late_ms);
            }
            self.clock.set(now);
            decision.tick(self.bank.snapshot(), self.clock.now());
            ticks += 1;
            last_tick = Some(now);

            if self.schedule.is_none() && self.merger.is_finished() {
                break false;
            }
        };

        info!(ticks, records = applied, interrupted, scheduled = recorded_stop.is_some(), "replay finished");
        Ok(ReplayEnd {
            at: self.clock.now(),
            ticks,
            interrupted,
            recorded_stop,
        })
    }
}

/// Unpaced replay still yields each tick so the dispatcher keeps draining.
async fn pace(pacer: &Pacer, mono_ms: u64) {
    if pacer.is_unpaced() {
        tokio::task::yield_now().await;
    } else {
        pacer.wait_until(mono_ms).await;
    }
}

/// Replay the run at `source` through a fresh pipeline.
///
/// Output goes to `output`, or to a new run directory under the configured
/// runs root.
#[instrument(name = "run_replay", skip_all, fields(source = %source.display()))]
pub async fn run_replay<F>(
    blueprint: &AutonomyBlueprint,
    source: &Path,
    output: Option<&Path>,
    shutdown: F,
) -> Result<RunOutcome>
where
    F: Future<Output = ()>,
{
    let layout = RunLayout::new(source);
    let merger = StreamMerger::open(&layout, blueprint.replay.end_of_stream)?;
    let schedule = TickSchedule::open(&layout)?;

    let ctx = match output {
        Some(dir) => {
            if same_dir(dir, source) {
                return Err(RuntimeError::OutputIsSource(dir.to_path_buf()));
            }
            RunContext::at(dir)?
        }
        None => RunContext::create(&blueprint.run.runs_root)?,
    };
    let meta = RunMeta::new(ctx.run_id(), RunMode::Replay, serde_json::to_value(blueprint)?).with_source_run(source);
    let mut session = Session::open(blueprint, ctx, meta).await?;

    let mut driver = ReplayDriver::new(merger, blueprint.decision_loop.tick_ms, blueprint.replay.speed);
    if let Some(schedule) = schedule {
        driver = driver.with_schedule(schedule);
    } else {
        info!("source run has no tick schedule, ticking every tick_ms from the first record");
    }
    let end = driver.run(&mut session.decision, shutdown).await?;

    let mut at = session.decision.final_stop_at(end.at);
    let reason = match (&end.recorded_stop, end.interrupted) {
        (_, true) => "shutdown signal".to_string(),
        (Some(stop), false) => {
            if stop.at.mono_ms > at.mono_ms {
                at = stop.at;
            }
            stop.reason.clone()
        }
        (None, false) => "replay complete".to_string(),
    };
    debug!(last_tick = end.at.mono_ms, stop_at = at.mono_ms, %reason, "final STOP scheduled");

    session.close(at, &reason, end.interrupted, driver.merger().stats()).await
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

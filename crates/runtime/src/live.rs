//! Live 运行：Mock 生产者写入单槽缓冲，固定频率 tick

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use contracts::{AutonomyBlueprint, Clock, InputRecord, SystemClock};
use dispatcher::{InputRecorder, RunContext, RunMeta, RunMode};
use ingestion::{IngestionPipeline, MockRecordSource, RecordTap};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, instrument, warn};

use crate::decision::DecisionLoop;
use crate::error::Result;
use crate::session::{RunOutcome, Session, DRAIN_TIMEOUT};

/// Register one mock producer per configured source.
///
/// With an input recorder, every accepted record is also written to the run
/// directory so the run can be replayed later.
pub fn build_live_pipeline(
    blueprint: &AutonomyBlueprint,
    clock: Arc<dyn Clock>,
    inputs: Option<Arc<InputRecorder>>,
) -> IngestionPipeline {
    let mut pipeline = IngestionPipeline::new();
    if let Some(inputs) = inputs {
        let tap: RecordTap = Arc::new(move |record: &InputRecord| {
            if let Err(e) = inputs.record(record) {
                warn!(stream = %record.stream(), error = %e, "failed to record input");
            }
        });
        pipeline = pipeline.with_tap(tap);
    }

    for source in &blueprint.sources {
        pipeline.register_source(
            source.id.clone(),
            Box::new(MockRecordSource::new(source.clone(), Arc::clone(&clock))),
        );
    }
    if pipeline.source_count() == 0 {
        warn!("no sources configured, every tick will see NO_SIGNAL and a lost link");
    }
    pipeline
}

/// Fixed-rate tick loop over a live slot bank.
pub struct LiveRunner {
    pipeline: IngestionPipeline,
    clock: Arc<dyn Clock>,
    tick: Duration,
}

impl LiveRunner {
    pub fn new(pipeline: IngestionPipeline, clock: Arc<dyn Clock>, tick_ms: u64) -> Self {
        Self {
            pipeline,
            clock,
            tick: Duration::from_millis(tick_ms.max(1)),
        }
    }

    /// Tick until `shutdown` resolves or `duration` elapses.
    ///
    /// Returns `true` when stopped by `shutdown`. Producers are stopped
    /// before returning.
    #[instrument(name = "live_runner", skip_all, fields(tick_ms = self.tick.as_millis() as u64))]
    pub async fn run<F>(self, decision: &mut DecisionLoop, duration: Option<Duration>, shutdown: F) -> bool
    where
        F: Future<Output = ()>,
    {
        let bank = self.pipeline.bank();
        self.pipeline.start_all();

        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = async {
            match duration {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        let interrupted = loop {
            tokio::select! {
                _ = &mut shutdown => break true,
                _ = &mut deadline => {
                    info!("run duration reached");
                    break false;
                }
                scheduled = interval.tick() => {
                    let late = Instant::now().saturating_duration_since(scheduled);
                    let now = self.clock.now();
                    if late > self.tick {
                        decision.record_overrun(now, late.as_millis() as u64);
                    }
                    decision.tick(bank.snapshot(), now);
                }
            }
        };

        self.pipeline.stop_all();
        interrupted
    }
}

/// Run live against the configured mock producers.
#[instrument(name = "run_live", skip_all)]
pub async fn run_live<F>(blueprint: &AutonomyBlueprint, duration: Option<Duration>, shutdown: F) -> Result<RunOutcome>
where
    F: Future<Output = ()>,
{
    let ctx = RunContext::create(&blueprint.run.runs_root)?;
    let meta = RunMeta::new(ctx.run_id(), RunMode::Live, serde_json::to_value(blueprint)?);
    let mut session = Session::open(blueprint, ctx, meta).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let inputs = blueprint
        .run
        .record_inputs
        .then(|| Arc::new(InputRecorder::new(&session.ctx)));
    let pipeline = build_live_pipeline(blueprint, Arc::clone(&clock), inputs.clone());

    info!(
        sources = pipeline.source_count(),
        tick_ms = blueprint.decision_loop.tick_ms,
        record_inputs = inputs.is_some(),
        "live run starting"
    );
    let runner = LiveRunner::new(pipeline, Arc::clone(&clock), blueprint.decision_loop.tick_ms);
    let interrupted = runner.run(&mut session.decision, duration, shutdown).await;

    if let Some(inputs) = &inputs {
        inputs.close();
    }

    // wait for the rate limit to admit the final STOP
    let slot = session.decision.final_stop_at(clock.now());
    let wait = stop_wait(slot.mono_ms.saturating_sub(clock.now().mono_ms));
    if !wait.is_zero() {
        tokio::time::sleep(wait).await;
    }
    let now = clock.now();
    let at = if now.mono_ms >= slot.mono_ms { now } else { slot };

    let reason = if interrupted { "shutdown signal" } else { "run complete" };
    session.close(at, reason, interrupted, Vec::new()).await
}

/// Wall time to hold the final STOP, capped at the sink drain timeout.
///
/// The STOP is still stamped at the admitting slot when the cap cuts the wait short.
fn stop_wait(wait_ms: u64) -> Duration {
    Duration::from_millis(wait_ms).min(DRAIN_TIMEOUT)
}

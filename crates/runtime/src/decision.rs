//! DecisionLoop - 一个 tick 内依次执行 Fusion → FSM → Gate
//!
//! 决策不读时钟：调用方给出每个 tick 的时间与槽快照，live 与 replay
//! 因此走完全相同的代码路径。墙钟只用于统计 tick 耗时。

use std::time::Instant;

use contracts::{
    AutonomyBlueprint, Event, EventType, FsmState, FusedObservation, Intent, IntentKind, RecordTime,
    TelemetryState, TickMark,
};
use decision_fsm::DecisionFsm;
use dispatcher::{DispatcherError, RunRecorder};
use fusion_engine::FusionEngine;
use ingestion::SlotSnapshot;
use observability::{RunMetricsAggregator, RunSummary};
use safety_gate::{AuditEntry, Command, CommandGate};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// What one tick did.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub fused: FusedObservation,
    pub state: FsmState,
    pub events: Vec<Event>,
    pub audit: AuditEntry,
}

/// Owns all per-run decision state.
pub struct DecisionLoop {
    fusion: FusionEngine,
    fsm: DecisionFsm,
    gate: CommandGate,
    recorder: RunRecorder,
    commands: mpsc::Sender<Command>,
    tick: u64,
    /// Last telemetry seen, reused for the final STOP
    telemetry: Option<TelemetryState>,
    /// Lateness of the coming tick, set by the runner
    overrun_pending: Option<u64>,
    stats: RunMetricsAggregator,
}

impl DecisionLoop {
    pub fn new(blueprint: &AutonomyBlueprint, recorder: RunRecorder, commands: mpsc::Sender<Command>) -> Self {
        let stale_ms = blueprint.vehicle.telemetry_stale_ms;
        Self {
            fusion: FusionEngine::new(blueprint.fusion.clone()),
            fsm: DecisionFsm::new(blueprint.fsm.clone(), stale_ms),
            gate: CommandGate::new(blueprint.gate.clone(), stale_ms),
            recorder,
            commands,
            tick: 0,
            telemetry: None,
            overrun_pending: None,
            stats: RunMetricsAggregator::new(),
        }
    }

    pub fn state(&self) -> FsmState {
        self.fsm.state()
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Evaluate one tick against the slot contents at `now`.
    #[instrument(name = "decision_tick", skip(self, snapshot), fields(tick = self.tick, mono_ms = now.mono_ms))]
    pub fn tick(&mut self, snapshot: SlotSnapshot, now: RecordTime) -> TickReport {
        let started = Instant::now();
        let tick = self.tick;
        self.tick += 1;
        let late_ms = self.overrun_pending.take();
        let marked = self.recorder.record_tick(&TickMark::tick(now, tick, late_ms));
        self.check_write(marked, "tick");
        if snapshot.telemetry.is_some() {
            self.telemetry = snapshot.telemetry;
        }

        let fused = self.fusion.fuse(snapshot.observations.iter().flatten(), now);
        let fused_written = self.recorder.record_fused(&fused);
        self.check_write(fused_written, "fused");

        let output = self.fsm.step(&fused, self.telemetry.as_ref(), now);
        let mut events = output.events;

        // An operator request takes this tick's single command slot
        let intent = match snapshot.operator {
            Some(request) => {
                info!(action = request.action.label(), "operator request");
                events.push(Event::info(now, EventType::OperatorRequest, request.action.label()));
                request.to_intent()
            }
            None => output.intent,
        };

        for event in &events {
            let written = self.recorder.record_event(event);
            self.check_write(written, "event");
            self.stats.record_event(event.event_type.as_str());
        }

        let audit = self.gate.evaluate(intent, self.telemetry.as_ref(), now, tick);
        self.emit(&audit);

        self.stats.record_state(output.state.as_str(), output.transition.is_some());
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        observability::record_tick_duration_ms(duration_ms);
        self.stats.record_tick(duration_ms, late_ms.is_some());
        debug!(
            state = %output.state,
            outcome = %audit.outcome,
            fused_status = ?fused.status,
            "tick complete"
        );

        TickReport {
            tick,
            fused,
            state: output.state,
            events,
            audit,
        }
    }

    /// Record that the coming tick starts late.
    pub fn record_overrun(&mut self, now: RecordTime, late_ms: u64) {
        self.overrun_pending = Some(late_ms);
        warn!(late_ms, tick = self.tick, "decision tick overrun");
        observability::record_tick_overrun();
        let event = Event::warn(now, EventType::TickOverrun, format!("tick late by {late_ms} ms"));
        let written = self.recorder.record_event(&event);
        self.check_write(written, "event");
        self.stats.record_event(event.event_type.as_str());
    }

    /// Earliest time the final STOP can pass the rate limit.
    pub fn final_stop_at(&mut self, now: RecordTime) -> RecordTime {
        self.gate.next_slot_at(now)
    }

    /// Emit the final STOP, log SHUTDOWN, then flush and close the run files.
    ///
    /// `at` should come from [`DecisionLoop::final_stop_at`]. Dropping the
    /// loop closes the command channel, which lets the dispatcher drain.
    #[instrument(name = "decision_finish", skip(self), fields(ticks = self.tick, mono_ms = at.mono_ms))]
    pub fn finish(mut self, at: RecordTime, reason: &str) -> Result<RunSummary, DispatcherError> {
        let tick = self.tick;
        let audit = self
            .gate
            .evaluate(Intent::from_fsm(IntentKind::Stop, at), self.telemetry.as_ref(), at, tick);
        if !audit.is_emitted() {
            warn!(outcome = %audit.outcome, "final STOP was not emitted");
        }
        self.emit(&audit);

        let event = Event::info(at, EventType::Shutdown, reason);
        self.recorder.record_event(&event)?;
        self.recorder.record_tick(&TickMark::stop(at, tick, reason))?;
        self.stats.record_event(event.event_type.as_str());

        self.recorder.flush()?;
        self.recorder.close()?;

        let summary = self.stats.summary();
        info!(
            ticks = summary.ticks,
            commands = summary.emitted_commands(),
            final_state = %self.fsm.state(),
            "decision loop finished"
        );
        Ok(summary)
    }

    /// Audit, count and hand the command (if any) to the dispatcher.
    fn emit(&mut self, audit: &AuditEntry) {
        let written = self.recorder.record_audit(audit);
        self.check_write(written, "audit");

        let command_type = audit.command.as_ref().map(|c| c.command_type().as_str());
        self.stats.record_gate(audit.outcome.as_str(), command_type);

        let Some(command) = &audit.command else {
            return;
        };
        match self.commands.try_send(command.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(c)) => {
                metrics::counter!("dispatch_dropped_total").increment(1);
                warn!(command = %c.command_type(), "dispatch queue full, command dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("dispatcher is gone, command not delivered");
            }
        }
    }

    fn check_write(&self, result: Result<(), DispatcherError>, what: &'static str) {
        if let Err(e) = result {
            metrics::counter!("run_record_failures_total", "file" => what).increment(1);
            error!(file = what, error = %e, "failed to write run record");
        }
    }
}

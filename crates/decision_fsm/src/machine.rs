//! DecisionFsm - 每 tick 一次的状态机评估

use contracts::{
    effective_link, Event, EventType, FsmConfig, FsmState, FusedObservation, Intent, IntentKind,
    LinkStatus, ObservationStatus, RecordTime, TelemetryState,
};
use tracing::{debug, info, instrument, warn};

use crate::events::EventThrottle;
use crate::transitions::{select, Guard};

/// Result of one FSM step.
#[derive(Debug, Clone, PartialEq)]
pub struct FsmOutput {
    /// State after this step
    pub state: FsmState,
    pub intent: Intent,
    /// Events that passed the cooldown filter, in emission order
    pub events: Vec<Event>,
    /// `(from, to)` if the state changed this step
    pub transition: Option<(FsmState, FsmState)>,
}

/// Tracking state machine.
///
/// Pure function of its inputs and `now`; it never reads a clock, so replay
/// drives it exactly like a live run.
#[derive(Debug)]
pub struct DecisionFsm {
    config: FsmConfig,
    telemetry_stale_ms: u64,
    state: FsmState,

    /// 进入当前状态的时间
    entered_at: Option<RecordTime>,
    /// 当前状态内最后一次有方位的 tick
    last_signal_at: Option<RecordTime>,
    /// lock_conf 持续满足的起点
    lock_candidate_since: Option<RecordTime>,
    /// 链路丢失的起点；Some 时状态与计时器冻结
    link_lost_at: Option<RecordTime>,

    throttle: EventThrottle,
}

impl DecisionFsm {
    pub fn new(config: FsmConfig, telemetry_stale_ms: u64) -> Self {
        let throttle = EventThrottle::new(config.event_cooldown_ms);
        Self {
            config,
            telemetry_stale_ms,
            state: FsmState::Search,
            entered_at: None,
            last_signal_at: None,
            lock_candidate_since: None,
            link_lost_at: None,
            throttle,
        }
    }

    pub fn state(&self) -> FsmState {
        self.state
    }

    pub fn config(&self) -> &FsmConfig {
        &self.config
    }

    /// Whether the link override is currently active.
    pub fn link_frozen(&self) -> bool {
        self.link_lost_at.is_some()
    }

    /// Evaluate one tick.
    #[instrument(
        level = "debug",
        name = "fsm_step",
        skip(self, fused, telemetry),
        fields(state = %self.state, mono_ms = now.mono_ms)
    )]
    pub fn step(
        &mut self,
        fused: &FusedObservation,
        telemetry: Option<&TelemetryState>,
        now: RecordTime,
    ) -> FsmOutput {
        let mut events = Vec::new();
        let entered_at = *self.entered_at.get_or_insert(now);

        let link = effective_link(telemetry, &now, self.telemetry_stale_ms);
        if link == LinkStatus::Lost {
            if self.link_lost_at.is_none() {
                warn!(state = %self.state, "telemetry link lost, holding");
                self.link_lost_at = Some(now);
                self.emit(
                    &mut events,
                    Event::warn(now, EventType::LinkLost, format!("link lost in {}", self.state)),
                );
            }
            return FsmOutput {
                state: self.state,
                intent: Intent::hold(now),
                events,
                transition: None,
            };
        }

        if let Some(lost_at) = self.link_lost_at.take() {
            let frozen_ms = now.since(&lost_at);
            self.shift_timers(frozen_ms);
            info!(frozen_ms, state = %self.state, "telemetry link recovered");
            self.emit(
                &mut events,
                Event::info(now, EventType::LinkRecovered, format!("link recovered after {frozen_ms} ms")),
            );
        }
        let entered_at = self.entered_at.unwrap_or(entered_at);

        let bearing = fused.bearing_deg;
        let signal = bearing.is_some();
        let ok = signal && fused.status == ObservationStatus::Ok;
        if signal {
            self.last_signal_at = Some(now);
        }

        if self.state == FsmState::Scan && ok && fused.confidence >= self.config.lock_conf {
            self.lock_candidate_since.get_or_insert(now);
        } else {
            self.lock_candidate_since = None;
        }

        let absent_since = self.last_signal_at.unwrap_or(entered_at);
        let holds = |guard: Guard| match guard {
            Guard::Acquired => ok && fused.confidence >= self.config.scan_conf,
            Guard::LockDwellMet => self
                .lock_candidate_since
                .is_some_and(|since| now.since(&since) >= self.config.lock_dwell_ms),
            Guard::SignalLost => !signal && now.since(&absent_since) > self.config.lost_timeout_ms,
            Guard::SignalRecovered => signal,
            Guard::CooldownElapsed => now.since(&entered_at) >= self.config.degraded_cooldown_ms,
        };

        let mut transition = None;
        if let Some(rule) = select(self.state, holds) {
            let from = self.state;
            self.enter(rule.to, now, signal);
            transition = Some((from, rule.to));

            info!(from = %from, to = %rule.to, reason = rule.reason, "fsm transition");
            metrics::counter!(
                "fsm_transitions_total",
                "from" => from.as_str(),
                "to" => rule.to.as_str()
            )
            .increment(1);
            metrics::gauge!("fsm_state").set(rule.to.level());

            self.emit(
                &mut events,
                Event::info(now, EventType::ModeChanged, format!("{from} -> {}: {}", rule.to, rule.reason)),
            );
            match (from, rule.to) {
                (FsmState::Search, FsmState::Scan) => {
                    let note = match bearing {
                        Some(b) => format!("bearing {b} confidence {:.3}", fused.confidence),
                        None => String::new(),
                    };
                    self.emit(&mut events, Event::info(now, EventType::TargetAcquired, note));
                }
                (_, FsmState::Degraded) => {
                    let note = format!("no bearing for {} ms", now.since(&absent_since));
                    self.emit(&mut events, Event::warn(now, EventType::TargetLost, note));
                }
                _ => {}
            }
        }

        let intent = self.intent_for(bearing, fused.confidence, now);
        debug!(state = %self.state, intent = intent.kind.label(), "fsm intent");

        FsmOutput {
            state: self.state,
            intent,
            events,
            transition,
        }
    }

    fn intent_for(&self, bearing: Option<f64>, confidence: f64, now: RecordTime) -> Intent {
        let kind = match (self.state, bearing) {
            (FsmState::Scan, Some(bearing_deg)) => IntentKind::ScanToward { bearing_deg },
            (FsmState::Locked, Some(bearing_deg)) if confidence >= self.config.lock_conf => {
                IntentKind::LockTrack { bearing_deg }
            }
            (FsmState::Locked, Some(bearing_deg)) => IntentKind::ScanToward { bearing_deg },
            _ => IntentKind::Hold,
        };
        Intent::from_fsm(kind, now)
    }

    fn enter(&mut self, state: FsmState, now: RecordTime, signal: bool) {
        self.state = state;
        self.entered_at = Some(now);
        self.last_signal_at = signal.then_some(now);
        self.lock_candidate_since = None;
    }

    /// Push timers forward by the time spent frozen under link loss.
    fn shift_timers(&mut self, ms: u64) {
        for timer in [
            &mut self.entered_at,
            &mut self.last_signal_at,
            &mut self.lock_candidate_since,
        ] {
            if let Some(t) = timer {
                *t = t.advanced_by(ms);
            }
        }
    }

    fn emit(&mut self, events: &mut Vec<Event>, event: Event) {
        if self.throttle.admit(&event) {
            events.push(event);
        } else {
            debug!(event_type = %event.event_type, "event suppressed by cooldown");
        }
    }
}

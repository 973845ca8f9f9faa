//! Test helpers: commands can only come out of the gate.

use contracts::{GateConfig, Intent, IntentKind, RecordTime};
use safety_gate::{Command, CommandGate};

/// A gated command at `mono_ms`, produced by a fresh gate.
pub fn gated(kind: IntentKind, mono_ms: u64) -> Command {
    let config = GateConfig {
        rate_limit_hz: 1000.0,
        ..GateConfig::default()
    };
    let mut gate = CommandGate::new(config, 1500);
    let now = RecordTime::new(1_700_000_000_000 + mono_ms as i64, mono_ms);
    let telemetry = contracts::TelemetryState::new(now, contracts::LinkStatus::Ok);
    gate.evaluate(Intent::from_fsm(kind, now), Some(&telemetry), now, mono_ms)
        .command
        .expect("fresh gate emits")
}

pub fn stop(mono_ms: u64) -> Command {
    gated(IntentKind::Stop, mono_ms)
}

//! CommandGate - Intent 到 Command 的唯一通路

use contracts::{
    effective_link, normalize_bearing, CommandKind, CommandLimits, GateConfig, Intent, IntentKind,
    IntentOrigin, LinkStatus, RecordTime, TelemetryState,
};
use tracing::{debug, instrument};

use crate::audit::{AuditEntry, GateOutcome, GateReason};
use crate::rate::RateWindow;
use crate::Command;

/// Flight modes an operator may request; both map to HOLD.
const HOLD_MODES: [&str; 2] = ["HOLD", "LOITER"];

pub struct CommandGate {
    config: GateConfig,
    telemetry_stale_ms: u64,
    limits: CommandLimits,
    window: RateWindow,
}

impl CommandGate {
    pub fn new(config: GateConfig, telemetry_stale_ms: u64) -> Self {
        let limits = CommandLimits {
            max_yaw_rate_deg_s: config.max_yaw_rate_deg_s,
            max_speed_m_s: config.max_speed_m_s,
            ttl_ms: config.command_ttl_ms,
        };
        let window = RateWindow::new(config.rate_limit_hz);
        Self {
            config,
            telemetry_stale_ms,
            limits,
            window,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Earliest time at which a command could be emitted.
    pub fn next_slot_at(&mut self, now: RecordTime) -> RecordTime {
        let slot = self.window.next_slot_at(now.mono_ms);
        now.advanced_by(slot - now.mono_ms)
    }

    /// Run every check on `intent` and record the result.
    ///
    /// The returned entry carries the command to dispatch, if any.
    #[instrument(
        level = "debug",
        name = "gate_evaluate",
        skip(self, intent, telemetry),
        fields(intent = intent.kind.label(), mono_ms = now.mono_ms)
    )]
    pub fn evaluate(
        &mut self,
        intent: Intent,
        telemetry: Option<&TelemetryState>,
        now: RecordTime,
        tick: u64,
    ) -> AuditEntry {
        let origin = intent.origin;
        let requested_at = intent.requested_at;
        let mut entry = AuditEntry::new(now, tick, intent);
        let mut substituted = false;

        let mut kind = match self.candidate(&entry.intent) {
            Ok(kind) => kind,
            Err(reason) => {
                entry.reasons.push(reason);
                substituted = true;
                CommandKind::Hold
            }
        };

        if !self.window.allows(now.mono_ms) {
            entry.outcome = GateOutcome::RateLimited;
            entry.reasons.push(GateReason::RateLimit);
            record_metrics(&entry);
            return entry;
        }

        let is_safety = kind.command_type().is_safety();
        if !is_safety && now.since(&requested_at) > self.config.command_ttl_ms {
            entry.reasons.push(GateReason::TtlExpired);
            substituted = true;
            kind = CommandKind::Hold;
        }

        let link = effective_link(telemetry, &now, self.telemetry_stale_ms);
        if link != LinkStatus::Ok && kind != CommandKind::Stop {
            entry.reasons.push(GateReason::LinkUnhealthy);
            substituted = true;
            kind = CommandKind::Stop;
        }

        let reasons_before = entry.reasons.len();
        let kind = self.clamp(kind, &mut entry.reasons);
        let clamped = entry.reasons.len() > reasons_before;

        entry.outcome = if substituted {
            GateOutcome::Substituted
        } else if clamped {
            GateOutcome::Clamped
        } else {
            GateOutcome::Forwarded
        };

        self.window.record(now.mono_ms);
        entry.command = Some(Command::new(now, kind, origin, self.limits));
        record_metrics(&entry);
        entry
    }

    /// Map an intent to its candidate command and apply the whitelist.
    fn candidate(&self, intent: &Intent) -> Result<CommandKind, GateReason> {
        let kind = match &intent.kind {
            IntentKind::Hold => CommandKind::Hold,
            IntentKind::Stop => CommandKind::Stop,
            IntentKind::ScanToward { bearing_deg } => CommandKind::SetYaw {
                yaw_deg: *bearing_deg,
                yaw_rate_deg_s: self.config.scan_yaw_rate_deg_s,
                relative: false,
            },
            IntentKind::LockTrack { bearing_deg } => CommandKind::SetYaw {
                yaw_deg: *bearing_deg,
                yaw_rate_deg_s: self.config.track_yaw_rate_deg_s,
                relative: false,
            },
            IntentKind::YawNudge { delta_deg } => CommandKind::SetYaw {
                yaw_deg: *delta_deg,
                yaw_rate_deg_s: self.config.scan_yaw_rate_deg_s,
                relative: true,
            },
            IntentKind::SetVelocity {
                north_m_s,
                east_m_s,
                down_m_s,
            } => CommandKind::SetVelocity {
                north_m_s: *north_m_s,
                east_m_s: *east_m_s,
                down_m_s: *down_m_s,
            },
            IntentKind::SetMode { mode } => {
                if HOLD_MODES.iter().any(|m| mode.eq_ignore_ascii_case(m)) {
                    CommandKind::Hold
                } else {
                    return Err(GateReason::Whitelist);
                }
            }
            IntentKind::Arm | IntentKind::Disarm if intent.origin != IntentOrigin::Operator => {
                return Err(GateReason::Whitelist);
            }
            IntentKind::Arm => CommandKind::Arm,
            IntentKind::Disarm => CommandKind::Disarm,
        };

        if !params_finite(&kind) {
            return Err(GateReason::InvalidParams);
        }

        let command_type = kind.command_type();
        if command_type.is_safety() || self.config.allow_types.contains(&command_type) {
            Ok(kind)
        } else {
            Err(GateReason::Whitelist)
        }
    }

    fn clamp(&self, kind: CommandKind, reasons: &mut Vec<GateReason>) -> CommandKind {
        match kind {
            CommandKind::SetYaw {
                yaw_deg,
                yaw_rate_deg_s,
                relative,
            } => {
                let max = self.config.max_yaw_rate_deg_s;
                let mut rate = yaw_rate_deg_s.abs();
                if rate > max {
                    reasons.push(GateReason::ClampedYawRate);
                    rate = max;
                }
                let yaw_deg = if relative {
                    wrap_signed(yaw_deg)
                } else {
                    normalize_bearing(yaw_deg)
                };
                CommandKind::SetYaw {
                    yaw_deg,
                    yaw_rate_deg_s: rate,
                    relative,
                }
            }
            CommandKind::SetVelocity {
                north_m_s,
                east_m_s,
                down_m_s,
            } => {
                let max = self.config.max_speed_m_s;
                let speed = (north_m_s * north_m_s + east_m_s * east_m_s + down_m_s * down_m_s).sqrt();
                if speed > max {
                    reasons.push(GateReason::ClampedVelocity);
                    let scale = max / speed;
                    CommandKind::SetVelocity {
                        north_m_s: north_m_s * scale,
                        east_m_s: east_m_s * scale,
                        down_m_s: down_m_s * scale,
                    }
                } else {
                    CommandKind::SetVelocity {
                        north_m_s,
                        east_m_s,
                        down_m_s,
                    }
                }
            }
            other => other,
        }
    }
}

fn params_finite(kind: &CommandKind) -> bool {
    match kind {
        CommandKind::SetYaw {
            yaw_deg,
            yaw_rate_deg_s,
            ..
        } => yaw_deg.is_finite() && yaw_rate_deg_s.is_finite(),
        CommandKind::SetVelocity {
            north_m_s,
            east_m_s,
            down_m_s,
        } => north_m_s.is_finite() && east_m_s.is_finite() && down_m_s.is_finite(),
        _ => true,
    }
}

/// Relative yaw in [-180, 180).
fn wrap_signed(deg: f64) -> f64 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}

fn record_metrics(entry: &AuditEntry) {
    metrics::counter!("gate_decisions_total", "outcome" => entry.outcome.as_str()).increment(1);
    for reason in &entry.reasons {
        metrics::counter!("gate_reasons_total", "reason" => reason.as_str()).increment(1);
    }
    if let Some(command) = &entry.command {
        metrics::counter!("gate_commands_total", "type" => command.command_type().as_str()).increment(1);
    }
    debug!(
        tick = entry.tick,
        outcome = %entry.outcome,
        reasons = ?entry.reasons,
        command = entry.command.as_ref().map(|c| c.command_type().as_str()),
        "gate decision"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::CommandType;
    use rand::Rng;

    fn t(mono_ms: u64) -> RecordTime {
        RecordTime::new(1_700_000_000_000 + mono_ms as i64, mono_ms)
    }

    fn link(mono_ms: u64, status: LinkStatus) -> TelemetryState {
        TelemetryState::new(t(mono_ms), status)
    }

    fn default_gate() -> CommandGate {
        CommandGate::new(GateConfig::default(), 1500)
    }

    fn fsm(kind: IntentKind, mono_ms: u64) -> Intent {
        Intent::from_fsm(kind, t(mono_ms))
    }

    fn operator(kind: IntentKind, mono_ms: u64) -> Intent {
        Intent {
            kind,
            origin: IntentOrigin::Operator,
            requested_at: t(mono_ms),
        }
    }

    fn eval(gate: &mut CommandGate, intent: Intent, mono_ms: u64) -> AuditEntry {
        gate.evaluate(intent, Some(&link(mono_ms, LinkStatus::Ok)), t(mono_ms), 0)
    }

    #[test]
    fn test_scan_toward_forwarded_as_set_yaw() {
        let mut gate = default_gate();
        let entry = eval(&mut gate, fsm(IntentKind::ScanToward { bearing_deg: 32.5 }, 0), 0);
        assert_eq!(entry.outcome, GateOutcome::Forwarded);
        assert!(entry.reasons.is_empty());
        let cmd = entry.command.unwrap();
        assert_eq!(
            cmd.kind(),
            &CommandKind::SetYaw {
                yaw_deg: 32.5,
                yaw_rate_deg_s: 30.0,
                relative: false
            }
        );
        assert_eq!(cmd.limits().ttl_ms, 1000);
    }

    #[test]
    fn test_arm_requires_operator_and_whitelist() {
        let mut gate = default_gate();
        let entry = eval(&mut gate, fsm(IntentKind::Arm, 0), 0);
        assert_eq!(entry.outcome, GateOutcome::Substituted);
        assert_eq!(entry.reasons, vec![GateReason::Whitelist]);
        assert_eq!(entry.command.unwrap().command_type(), CommandType::Hold);

        // operator origin but ARM not in the default allow list
        let entry = eval(&mut gate, operator(IntentKind::Arm, 1000), 1000);
        assert_eq!(entry.command.unwrap().command_type(), CommandType::Hold);

        let mut config = GateConfig::default();
        config.allow_types.push(CommandType::Arm);
        let mut gate = CommandGate::new(config, 1500);
        let entry = eval(&mut gate, operator(IntentKind::Arm, 0), 0);
        assert_eq!(entry.outcome, GateOutcome::Forwarded);
        assert_eq!(entry.command.unwrap().command_type(), CommandType::Arm);
    }

    #[test]
    fn test_set_mode() {
        let mut gate = default_gate();
        let entry = eval(&mut gate, operator(IntentKind::SetMode { mode: "loiter".into() }, 0), 0);
        assert_eq!(entry.outcome, GateOutcome::Forwarded);
        assert_eq!(entry.command.unwrap().command_type(), CommandType::Hold);

        let entry = eval(&mut gate, operator(IntentKind::SetMode { mode: "RTL".into() }, 1000), 1000);
        assert_eq!(entry.outcome, GateOutcome::Substituted);
        assert_eq!(entry.reasons, vec![GateReason::Whitelist]);
    }

    #[test]
    fn test_rate_limited_drops() {
        let mut gate = default_gate();
        let intent = |ms| fsm(IntentKind::LockTrack { bearing_deg: 10.0 }, ms);
        assert!(eval(&mut gate, intent(0), 0).is_emitted());

        let entry = eval(&mut gate, intent(100), 100);
        assert_eq!(entry.outcome, GateOutcome::RateLimited);
        assert_eq!(entry.reasons, vec![GateReason::RateLimit]);
        assert!(entry.command.is_none());

        assert!(eval(&mut gate, intent(200), 200).is_emitted());
    }

    #[test]
    fn test_rate_property_holds_for_random_traffic() {
        let mut rng = rand::rng();
        let mut gate = default_gate();
        let mut emitted = Vec::new();
        let mut now = 0u64;

        for _ in 0..2000 {
            now += rng.random_range(0..120);
            let kind = match rng.random_range(0..4) {
                0 => IntentKind::Hold,
                1 => IntentKind::ScanToward { bearing_deg: 90.0 },
                2 => IntentKind::Arm,
                _ => IntentKind::Stop,
            };
            let status = if rng.random_bool(0.2) { LinkStatus::Lost } else { LinkStatus::Ok };
            let entry = gate.evaluate(fsm(kind, now), Some(&link(now, status)), t(now), 0);
            if entry.is_emitted() {
                emitted.push(now);
            }
        }

        for (i, &end) in emitted.iter().enumerate() {
            let in_window = emitted[..=i].iter().filter(|&&s| s + 1000 > end).count();
            assert!(in_window <= 5, "{in_window} commands in window ending {end}");
        }
    }

    #[test]
    fn test_ttl_expired_becomes_hold() {
        let mut gate = default_gate();
        let entry = eval(&mut gate, fsm(IntentKind::ScanToward { bearing_deg: 5.0 }, 0), 1000);
        assert_eq!(entry.outcome, GateOutcome::Forwarded);

        let entry = eval(&mut gate, fsm(IntentKind::ScanToward { bearing_deg: 5.0 }, 199), 1200);
        assert_eq!(entry.outcome, GateOutcome::Substituted);
        assert_eq!(entry.reasons, vec![GateReason::TtlExpired]);
        assert_eq!(entry.command.unwrap().command_type(), CommandType::Hold);
    }

    #[test]
    fn test_unhealthy_link_forces_stop() {
        for status in [LinkStatus::Lost, LinkStatus::Degraded] {
            let mut gate = default_gate();
            let intent = fsm(IntentKind::LockTrack { bearing_deg: 20.0 }, 0);
            let entry = gate.evaluate(intent, Some(&link(0, status)), t(0), 3);
            assert_eq!(entry.outcome, GateOutcome::Substituted);
            assert_eq!(entry.reasons, vec![GateReason::LinkUnhealthy]);
            assert_eq!(entry.tick, 3);
            assert_eq!(entry.command.unwrap().command_type(), CommandType::Stop);
        }

        // missing telemetry; HOLD is not STOP so it is replaced too
        let mut gate = default_gate();
        let entry = gate.evaluate(fsm(IntentKind::Hold, 0), None, t(0), 0);
        assert_eq!(entry.command.unwrap().command_type(), CommandType::Stop);

        // stale telemetry
        let mut gate = default_gate();
        let entry = gate.evaluate(fsm(IntentKind::Hold, 2000), Some(&link(0, LinkStatus::Ok)), t(2000), 0);
        assert_eq!(entry.reasons, vec![GateReason::LinkUnhealthy]);
    }

    #[test]
    fn test_stop_passes_lost_link_untouched() {
        let mut gate = default_gate();
        let entry = gate.evaluate(operator(IntentKind::Stop, 0), None, t(0), 0);
        assert_eq!(entry.outcome, GateOutcome::Forwarded);
        assert!(entry.reasons.is_empty());
        assert_eq!(entry.command.unwrap().origin(), IntentOrigin::Operator);
    }

    #[test]
    fn test_clamps() {
        let config = GateConfig {
            track_yaw_rate_deg_s: 90.0,
            ..GateConfig::default()
        };
        let mut gate = CommandGate::new(config, 1500);
        let entry = eval(&mut gate, fsm(IntentKind::LockTrack { bearing_deg: 370.0 }, 0), 0);
        assert_eq!(entry.outcome, GateOutcome::Clamped);
        assert_eq!(entry.reasons, vec![GateReason::ClampedYawRate]);
        assert_eq!(
            entry.command.unwrap().kind(),
            &CommandKind::SetYaw {
                yaw_deg: 10.0,
                yaw_rate_deg_s: 60.0,
                relative: false
            }
        );

        let velocity = IntentKind::SetVelocity {
            north_m_s: 6.0,
            east_m_s: 8.0,
            down_m_s: 0.0,
        };
        let entry = eval(&mut gate, operator(velocity, 1000), 1000);
        assert_eq!(entry.reasons, vec![GateReason::ClampedVelocity]);
        match entry.command.unwrap().kind() {
            CommandKind::SetVelocity {
                north_m_s, east_m_s, ..
            } => {
                assert!((north_m_s - 3.0).abs() < 1e-9);
                assert!((east_m_s - 4.0).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_yaw_nudge_is_relative() {
        let mut gate = default_gate();
        let entry = eval(&mut gate, operator(IntentKind::YawNudge { delta_deg: -15.0 }, 0), 0);
        assert_eq!(
            entry.command.unwrap().kind(),
            &CommandKind::SetYaw {
                yaw_deg: -15.0,
                yaw_rate_deg_s: 30.0,
                relative: true
            }
        );
    }

    #[test]
    fn test_non_finite_params_hold() {
        let mut gate = default_gate();
        let entry = eval(&mut gate, fsm(IntentKind::ScanToward { bearing_deg: f64::NAN }, 0), 0);
        assert_eq!(entry.reasons, vec![GateReason::InvalidParams]);
        assert_eq!(entry.command.unwrap().command_type(), CommandType::Hold);
    }

    #[test]
    fn test_substitutes_count_toward_rate() {
        let mut gate = default_gate();
        let entry = gate.evaluate(fsm(IntentKind::Hold, 0), None, t(0), 0);
        assert_eq!(entry.outcome, GateOutcome::Substituted);
        let entry = gate.evaluate(fsm(IntentKind::Hold, 50), None, t(50), 1);
        assert_eq!(entry.outcome, GateOutcome::RateLimited);
        assert_eq!(gate.next_slot_at(t(50)).mono_ms, 200);
        assert_eq!(gate.next_slot_at(t(250)).mono_ms, 250);
    }

    #[test]
    fn test_audit_json_shape() {
        let mut gate = default_gate();
        let entry = gate.evaluate(fsm(IntentKind::LockTrack { bearing_deg: 1.0 }, 0), None, t(0), 9);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["tick"], 9);
        assert_eq!(json["outcome"], "SUBSTITUTED");
        assert_eq!(json["reasons"][0], "LINK_UNHEALTHY");
        assert_eq!(json["intent"]["kind"], "LOCK_TRACK");
        assert_eq!(json["command"]["type"], "STOP");
    }
}

//! # Integration Tests
//!
//! 跨 crate 的集成测试与端到端测试。
//!
//! 负责：
//! - 示例配置可加载
//! - 组件链场景：Fusion → FSM → Gate
//! - 回放确定性（任意倍速输出逐字节一致）
//! - Live 与回放等价

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{MockSourceKind, SinkType};

    #[test]
    fn test_sample_config_loads() {
        let content = include_str!("../../../demos/autonomy.toml");
        let blueprint = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();

        assert_eq!(blueprint.vehicle.name, "uav-01");
        assert_eq!(blueprint.sources.len(), 4);
        assert!(blueprint
            .sources
            .iter()
            .any(|s| s.kind == MockSourceKind::Telemetry && s.fault.is_some()));
        assert_eq!(blueprint.sinks[1].sink_type, SinkType::File);
    }

    #[test]
    fn test_config_survives_run_meta() {
        // replay re-reads the configuration stored in run_meta.json
        let content = include_str!("../../../demos/autonomy.toml");
        let blueprint = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&blueprint).unwrap();
        let reloaded = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(reloaded.fsm.lock_conf, blueprint.fsm.lock_conf);
        assert_eq!(reloaded.gate.allow_types, blueprint.gate.allow_types);
    }
}

#[cfg(test)]
mod scenario_tests {
    use std::collections::BTreeSet;

    use contracts::{
        AutonomyBlueprint, CommandKind, FsmState, Intent, IntentKind, LinkStatus, Observation,
        ObservationStatus, RecordTime, SourceKind, TelemetryState,
    };
    use decision_fsm::DecisionFsm;
    use fusion_engine::FusionEngine;
    use safety_gate::{CommandGate, GateOutcome, GateReason};

    fn t(mono_ms: u64) -> RecordTime {
        RecordTime::new(1_700_000_000_000 + mono_ms as i64, mono_ms)
    }

    struct Chain {
        fusion: FusionEngine,
        fsm: DecisionFsm,
        gate: CommandGate,
    }

    impl Chain {
        fn new(blueprint: &AutonomyBlueprint) -> Self {
            let stale = blueprint.vehicle.telemetry_stale_ms;
            Self {
                fusion: FusionEngine::new(blueprint.fusion.clone()),
                fsm: DecisionFsm::new(blueprint.fsm.clone(), stale),
                gate: CommandGate::new(blueprint.gate.clone(), stale),
            }
        }
    }

    #[test]
    fn test_single_vision_source_scans_toward_bearing() {
        let mut chain = Chain::new(&AutonomyBlueprint::default());
        let now = t(1000);
        let vision = Observation::ok(SourceKind::Vision, now, 32.5, 0.78);
        let telemetry = TelemetryState::new(now, LinkStatus::Ok);

        let fused = chain.fusion.fuse([&vision], now);
        assert_eq!(fused.bearing_deg, Some(32.5));
        assert_eq!(fused.status, ObservationStatus::Ok);
        assert_eq!(fused.contributing_sources, BTreeSet::from([SourceKind::Vision]));

        let output = chain.fsm.step(&fused, Some(&telemetry), now);
        assert_eq!(output.state, FsmState::Scan);
        assert_eq!(output.transition, Some((FsmState::Search, FsmState::Scan)));
        assert_eq!(output.intent.kind, IntentKind::ScanToward { bearing_deg: 32.5 });

        let audit = chain.gate.evaluate(output.intent, Some(&telemetry), now, 0);
        assert_eq!(audit.outcome, GateOutcome::Forwarded);
        match audit.command.unwrap().kind() {
            CommandKind::SetYaw { yaw_deg, relative, .. } => {
                assert_eq!(*yaw_deg, 32.5);
                assert!(!relative);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_agreeing_sources_fuse_across_north() {
        let mut blueprint = AutonomyBlueprint::default();
        blueprint.fusion.priorities.thermal = blueprint.fusion.priorities.vision;
        let mut chain = Chain::new(&blueprint);
        let now = t(1000);
        let vision = Observation::ok(SourceKind::Vision, now, 355.0, 0.8);
        let thermal = Observation::ok(SourceKind::Thermal, now, 5.0, 0.8);

        let fused = chain.fusion.fuse([&vision, &thermal], now);
        let bearing = fused.bearing_deg.unwrap();
        assert!(bearing < 1e-6 || bearing > 360.0 - 1e-6, "got {bearing}");
        assert_eq!(fused.contributing_sources.len(), 2);
    }

    #[test]
    fn test_no_usable_observation_holds() {
        let mut chain = Chain::new(&AutonomyBlueprint::default());
        let now = t(1000);
        let audio = Observation::new(SourceKind::Audio, now, None, None, ObservationStatus::NoSignal);
        let telemetry = TelemetryState::new(now, LinkStatus::Ok);

        let fused = chain.fusion.fuse([&audio], now);
        assert_eq!(fused.bearing_deg, None);
        assert!(matches!(fused.status, ObservationStatus::NoSignal | ObservationStatus::Invalid));

        let output = chain.fsm.step(&fused, Some(&telemetry), now);
        assert_eq!(output.state, FsmState::Search);
        let audit = chain.gate.evaluate(output.intent, Some(&telemetry), now, 0);
        assert!(audit.command.unwrap().command_type().is_safety());
    }

    #[test]
    fn test_link_lost_while_locked_stops() {
        let mut blueprint = AutonomyBlueprint::default();
        blueprint.gate.rate_limit_hz = 50.0;
        let mut chain = Chain::new(&blueprint);

        let mut mono = 1000;
        let mut tick = 0;
        while chain.fsm.state() != FsmState::Locked {
            let now = t(mono);
            let vision = Observation::ok(SourceKind::Vision, now, 32.5, 0.9);
            let telemetry = TelemetryState::new(now, LinkStatus::Ok);
            let fused = chain.fusion.fuse([&vision], now);
            let output = chain.fsm.step(&fused, Some(&telemetry), now);
            chain.gate.evaluate(output.intent, Some(&telemetry), now, tick);
            mono += 100;
            tick += 1;
            assert!(mono < 5000, "never locked");
        }

        let now = t(mono);
        let vision = Observation::ok(SourceKind::Vision, now, 32.5, 0.9);
        let telemetry = TelemetryState::new(now, LinkStatus::Lost);
        let fused = chain.fusion.fuse([&vision], now);
        let output = chain.fsm.step(&fused, Some(&telemetry), now);
        let audit = chain.gate.evaluate(output.intent, Some(&telemetry), now, tick);

        let command = audit.command.unwrap();
        assert_eq!(command.kind(), &CommandKind::Stop);
        // never DEGRADED -> LOCKED: the state machine froze instead
        assert_eq!(chain.fsm.state(), FsmState::Locked);
    }

    #[test]
    fn test_expired_intent_is_replaced() {
        let mut chain = Chain::new(&AutonomyBlueprint::default());
        let now = t(5000);
        let telemetry = TelemetryState::new(now, LinkStatus::Ok);
        let intent = Intent::from_fsm(IntentKind::ScanToward { bearing_deg: 90.0 }, t(3500));

        let audit = chain.gate.evaluate(intent, Some(&telemetry), now, 0);
        assert_eq!(audit.outcome, GateOutcome::Substituted);
        assert!(audit.reasons.contains(&GateReason::TtlExpired));
        assert!(audit.command.unwrap().command_type().is_safety());
    }
}

#[cfg(test)]
mod replay_tests {
    use std::fs;
    use std::path::Path;

    use contracts::{
        AutonomyBlueprint, FaultConfig, InputRecord, MockSourceKind, OperatorAction, OperatorRequest,
        RecordTime, RunLayout, SourceConfig,
    };
    use dispatcher::{InputRecorder, RunContext, RunMeta, RunMode, RunRecorder};
    use ingestion::{build_record, SlotBank};
    use runtime::DecisionLoop;
    use serde_json::Value;
    use tokio::sync::mpsc;

    const START: RecordTime = RecordTime {
        epoch_ms: 1_700_000_000_000,
        mono_ms: 10_000,
    };

    fn source(id: &str, kind: MockSourceKind, bearing_deg: f64, confidence: f64, fault: Option<FaultConfig>) -> SourceConfig {
        SourceConfig {
            id: id.to_string(),
            kind,
            rate_hz: 10.0,
            bearing_deg,
            drift_deg_s: 2.0,
            confidence,
            fault,
        }
    }

    /// Vision and thermal tracking a drifting target, audio silent for a
    /// while and a telemetry dropout in the middle of the lock.
    fn scenario() -> AutonomyBlueprint {
        let mut blueprint = AutonomyBlueprint::default();
        blueprint.sources = vec![
            source("cam", MockSourceKind::Vision, 32.5, 0.85, None),
            source("ir", MockSourceKind::Thermal, 34.0, 0.7, None),
            source(
                "mic",
                MockSourceKind::Audio,
                45.0,
                0.4,
                Some(FaultConfig {
                    after_ms: 500,
                    duration_ms: 1500,
                }),
            ),
            source(
                "fc",
                MockSourceKind::Telemetry,
                0.0,
                1.0,
                Some(FaultConfig {
                    after_ms: 2500,
                    duration_ms: 600,
                }),
            ),
        ];
        blueprint
    }

    /// Drive a decision loop the way a live run does. Producers emit every
    /// `tick_ms` from `START`; the loop ticks `phase_ms` later, and the
    /// ticks listed in `late_ticks` start 130 ms late.
    fn simulate_live(dir: &Path, blueprint: &AutonomyBlueprint, ticks: u64, phase_ms: u64, late_ticks: &[u64]) {
        let ctx = RunContext::at(dir).unwrap();
        let meta = RunMeta::new(ctx.run_id(), RunMode::Live, serde_json::to_value(blueprint).unwrap());
        ctx.write_meta(&meta).unwrap();

        let inputs = InputRecorder::new(&ctx);
        let (tx, mut rx) = mpsc::channel(512);
        let mut decision = DecisionLoop::new(blueprint, RunRecorder::open(&ctx).unwrap(), tx);
        let bank = SlotBank::new();

        let tick_ms = blueprint.decision_loop.tick_ms;
        let mut now = START;
        for k in 0..ticks {
            let produced = START.advanced_by(k * tick_ms);
            for config in &blueprint.sources {
                let record = build_record(config, START, produced);
                inputs.record(&record).unwrap();
                bank.put(record);
            }
            now = produced.advanced_by(phase_ms);
            if late_ticks.contains(&k) {
                decision.record_overrun(now, 130);
            }
            decision.tick(bank.snapshot(), now);
            while rx.try_recv().is_ok() {}
        }
        inputs.close();

        let at = decision.final_stop_at(now);
        decision.finish(at, "run complete").unwrap();
    }

    async fn replay(source: &Path, output: &Path, blueprint: &AutonomyBlueprint) -> runtime::RunOutcome {
        runtime::run_replay(blueprint, source, Some(output), std::future::pending::<()>())
            .await
            .unwrap()
    }

    fn read(dir: &Path, name: &str) -> String {
        fs::read_to_string(dir.join(name)).unwrap()
    }

    fn lines(dir: &Path, name: &str) -> Vec<Value> {
        read(dir, name)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_replay_is_identical_at_any_speed() {
        let dir = tempfile::tempdir().unwrap();
        let blueprint = scenario();
        let recorded = dir.path().join("recorded");
        simulate_live(&recorded, &blueprint, 40, 0, &[]);

        let mut fast = blueprint.clone();
        fast.replay.speed = 0.0;
        let mut paced = blueprint.clone();
        paced.replay.speed = 20.0;

        let a = dir.path().join("unpaced");
        let b = dir.path().join("paced");
        let outcome_a = replay(&recorded, &a, &fast).await;
        let outcome_b = replay(&recorded, &b, &paced).await;

        assert_eq!(outcome_a.summary.ticks, 40);
        assert_eq!(outcome_b.summary.ticks, 40);
        for file in ["commands.jsonl", "events.jsonl", "fused.jsonl"] {
            assert_eq!(read(&a, file), read(&b, file), "{file} differs");
        }
    }

    #[tokio::test]
    async fn test_replay_matches_live_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut blueprint = scenario();
        blueprint.replay.speed = 0.0;
        let recorded = dir.path().join("recorded");
        simulate_live(&recorded, &blueprint, 50, 0, &[]);

        let replayed = dir.path().join("replayed");
        let outcome = replay(&recorded, &replayed, &blueprint).await;
        assert!(!outcome.interrupted);

        for file in ["commands.jsonl", "events.jsonl", "fused.jsonl"] {
            assert_eq!(read(&recorded, file), read(&replayed, file), "{file} differs");
        }
    }

    #[tokio::test]
    async fn test_replay_keeps_live_tick_phase() {
        let dir = tempfile::tempdir().unwrap();
        let mut blueprint = scenario();
        blueprint.replay.speed = 0.0;
        let recorded = dir.path().join("recorded");
        simulate_live(&recorded, &blueprint, 50, 40, &[7, 31]);

        let replayed = dir.path().join("replayed");
        let outcome = replay(&recorded, &replayed, &blueprint).await;
        assert!(!outcome.interrupted);
        assert_eq!(outcome.summary.ticks, 50);

        let fused = lines(&replayed, "fused.jsonl");
        assert_eq!(fused[0]["time"]["mono_ms"], START.mono_ms + 40);
        for file in ["commands.jsonl", "events.jsonl", "fused.jsonl", "ticks.jsonl"] {
            assert_eq!(read(&recorded, file), read(&replayed, file), "{file} differs");
        }

        let events = read(&replayed, "events.jsonl");
        assert_eq!(events.matches("TICK_OVERRUN").count(), 2);
        assert!(events.lines().last().unwrap().contains("run complete"));
    }

    #[tokio::test]
    async fn test_rate_limit_holds_over_every_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut blueprint = scenario();
        blueprint.replay.speed = 0.0;
        let recorded = dir.path().join("recorded");
        simulate_live(&recorded, &blueprint, 60, 0, &[]);

        let replayed = dir.path().join("replayed");
        replay(&recorded, &replayed, &blueprint).await;

        let emitted: Vec<u64> = lines(&replayed, "commands.jsonl")
            .iter()
            .filter(|entry| !entry["command"].is_null())
            .map(|entry| entry["time"]["mono_ms"].as_u64().unwrap())
            .collect();
        assert!(!emitted.is_empty());

        let max = blueprint.gate.rate_limit_hz.floor() as usize;
        for (i, start) in emitted.iter().enumerate() {
            let in_window = emitted[i..].iter().take_while(|t| **t < start + 1000).count();
            assert!(in_window <= max, "{in_window} commands within 1 s of {start}");
        }
    }

    #[tokio::test]
    async fn test_telemetry_dropout_stops_and_last_command_is_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut blueprint = scenario();
        blueprint.replay.speed = 0.0;
        let recorded = dir.path().join("recorded");
        simulate_live(&recorded, &blueprint, 40, 0, &[]);

        let replayed = dir.path().join("replayed");
        replay(&recorded, &replayed, &blueprint).await;
        let audits = lines(&replayed, "commands.jsonl");

        // link LOST from 2500 ms after start
        let lost_at = START.mono_ms + 2500;
        let first_after = audits
            .iter()
            .find(|entry| entry["time"]["mono_ms"].as_u64().unwrap() >= lost_at && !entry["command"].is_null())
            .unwrap();
        assert_eq!(first_after["command"]["type"], "STOP");
        assert!(first_after["reasons"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r == "LINK_UNHEALTHY"));

        let last = audits.last().unwrap();
        assert_eq!(last["command"]["type"], "STOP");

        let events = read(&replayed, "events.jsonl");
        assert!(events.contains("LINK_LOST"));
        assert!(events.contains("LINK_RECOVERED"));
        assert!(events.lines().last().unwrap().contains("SHUTDOWN"));
    }

    #[tokio::test]
    async fn test_operator_request_expires_in_fast_replay() {
        let dir = tempfile::tempdir().unwrap();
        let mut blueprint = scenario();
        blueprint.sources.retain(|s| s.kind == MockSourceKind::Telemetry);
        blueprint.sources[0].fault = None;
        blueprint.decision_loop.tick_ms = 100;
        let recorded = dir.path().join("recorded");
        simulate_live(&recorded, &blueprint, 10, 0, &[]);

        // without a tick schedule the replay ticks at its own tick_ms
        fs::remove_file(RunLayout::new(&recorded).ticks()).unwrap();

        // a nudge recorded between ticks of a slow loop reaches the gate late
        let ctx = RunContext::at(&recorded).unwrap();
        let late = InputRecorder::new(&ctx);
        let request = OperatorRequest::new(START.advanced_by(100), OperatorAction::YawNudge { delta_deg: 15.0 });
        late.record(&InputRecord::Operator(request)).unwrap();
        late.close();

        let mut slow = blueprint.clone();
        slow.decision_loop.tick_ms = 1500;
        slow.replay.speed = 8.0;
        let replayed = dir.path().join("replayed");
        replay(&recorded, &replayed, &slow).await;

        let audits = lines(&replayed, "commands.jsonl");
        let nudge = audits
            .iter()
            .find(|entry| entry["intent"]["origin"] == "operator")
            .unwrap();
        assert_eq!(nudge["outcome"], "SUBSTITUTED");
        assert!(nudge["reasons"].as_array().unwrap().iter().any(|r| r == "TTL_EXPIRED"));
        assert_ne!(nudge["command"]["type"], "SET_YAW");
    }
}

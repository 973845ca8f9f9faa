//! `info` command implementation.

use anyhow::Context;
use contracts::AutonomyBlueprint;

use crate::cli::InfoArgs;
use crate::error::Result;

/// Execute the `info` command
pub fn run_info(args: &InfoArgs, blueprint: &AutonomyBlueprint) -> Result<()> {
    if args.json {
        let json = serde_json::to_string_pretty(blueprint).context("Failed to serialize configuration")?;
        println!("{json}");
    } else {
        print_config_info(blueprint);
    }
    Ok(())
}

fn print_config_info(blueprint: &AutonomyBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               UAV Companion Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Vehicle");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Name: {}", blueprint.vehicle.name);
    println!("   ├─ Telemetry stale after: {} ms", blueprint.vehicle.telemetry_stale_ms);
    println!("   └─ Decision tick: {} ms", blueprint.decision_loop.tick_ms);

    let f = &blueprint.fusion;
    println!("\nFusion");
    println!("   ├─ Stale after: {} ms", f.stale_after_ms);
    println!("   ├─ Agreement tolerance: {}°", f.agreement_tolerance_deg);
    println!("   ├─ Degraded penalty: {}", f.degraded_penalty);
    println!("   ├─ Default confidence: {}", f.default_confidence);
    println!(
        "   └─ Priorities: vision={} thermal={} audio={}",
        f.priorities.vision, f.priorities.thermal, f.priorities.audio
    );

    let s = &blueprint.fsm;
    println!("\nState machine");
    println!("   ├─ Scan / lock confidence: {} / {}", s.scan_conf, s.lock_conf);
    println!("   ├─ Lock dwell: {} ms", s.lock_dwell_ms);
    println!("   ├─ Lost timeout: {} ms", s.lost_timeout_ms);
    println!("   ├─ Degraded cooldown: {} ms", s.degraded_cooldown_ms);
    println!("   └─ Event cooldown: {} ms", s.event_cooldown_ms);

    let g = &blueprint.gate;
    let allowed: Vec<String> = g.allow_types.iter().map(ToString::to_string).collect();
    println!("\nSafety gate");
    println!("   ├─ Rate limit: {} Hz", g.rate_limit_hz);
    println!("   ├─ Command TTL: {} ms", g.command_ttl_ms);
    println!("   ├─ Allowed: {}", allowed.join(", "));
    println!(
        "   ├─ Yaw rate scan / track / max: {} / {} / {} °/s",
        g.scan_yaw_rate_deg_s, g.track_yaw_rate_deg_s, g.max_yaw_rate_deg_s
    );
    println!("   └─ Max speed: {} m/s", g.max_speed_m_s);

    println!("\nSources ({})", blueprint.sources.len());
    for (i, src) in blueprint.sources.iter().enumerate() {
        let branch = if i + 1 == blueprint.sources.len() { "└─" } else { "├─" };
        let fault = src
            .fault
            .map(|fault| format!(", fault at {} ms for {} ms", fault.after_ms, fault.duration_ms))
            .unwrap_or_default();
        println!(
            "   {branch} {} ({:?}) {} Hz, bearing {}°, confidence {}{fault}",
            src.id, src.kind, src.rate_hz, src.bearing_deg, src.confidence
        );
    }

    println!("\nSinks ({})", blueprint.sinks.len());
    for (i, sink) in blueprint.sinks.iter().enumerate() {
        let branch = if i + 1 == blueprint.sinks.len() { "└─" } else { "├─" };
        println!(
            "   {branch} {} ({:?}), queue {}",
            sink.name, sink.sink_type, sink.queue_capacity
        );
    }

    println!("\nRuns");
    println!("   ├─ Root: {}", blueprint.run.runs_root.display());
    println!("   ├─ Record inputs: {}", blueprint.run.record_inputs);
    println!(
        "   └─ Replay: speed {}, end of stream {:?}",
        blueprint.replay.speed, blueprint.replay.end_of_stream
    );
    println!();
}

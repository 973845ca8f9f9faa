//! `replay` command implementation.

use std::fs;
use std::path::Path;

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{AutonomyBlueprint, ReplayConfig, RunLayout, MIN_REPLAY_SPEED};
use replay_engine::{resolve_run_dir, validate_run};
use tracing::{debug, info, warn};

use super::{print_outcome, shutdown_signal};
use crate::cli::ReplayArgs;
use crate::error::{CliError, Result};

/// Execute the `replay` command
pub async fn run_replay(args: &ReplayArgs, blueprint: AutonomyBlueprint) -> Result<()> {
    let source = resolve_run_dir(&blueprint.run.runs_root, &args.run)?;

    let report = validate_run(&source)?;
    if !report.is_valid(false) {
        eprintln!("{report}");
        return Err(CliError::RunInvalid { path: source });
    }

    let mut blueprint = if args.config.config.is_some() {
        blueprint
    } else {
        with_recorded_decision_config(blueprint, &source)?
    };
    if let Some(speed) = args.speed {
        if !ReplayConfig::is_valid_speed(speed) {
            return Err(CliError::config(
                "--speed",
                format!("must be 0 or between {MIN_REPLAY_SPEED} and 1000, got {speed}"),
            ));
        }
        blueprint.replay.speed = speed;
    }
    if let Some(policy) = args.end_of_stream {
        blueprint.replay.end_of_stream = policy.into();
    }

    info!(
        source = %source.display(),
        records = report.total_records(),
        speed = blueprint.replay.speed,
        end_of_stream = ?blueprint.replay.end_of_stream,
        "starting replay"
    );

    let outcome = runtime::run_replay(&blueprint, &source, args.output.as_deref(), shutdown_signal()).await?;

    info!(
        run_id = %outcome.run_id,
        ticks = outcome.summary.ticks,
        commands = outcome.summary.emitted_commands(),
        interrupted = outcome.interrupted,
        "replay finished"
    );
    print_outcome(&outcome);
    Ok(())
}

/// Take the decision-relevant sections from the recorded run's `meta.json`.
///
/// Sinks, run directory, replay and observability settings stay local so a
/// replay never talks to the recorded run's outputs.
fn with_recorded_decision_config(mut local: AutonomyBlueprint, source: &Path) -> Result<AutonomyBlueprint> {
    let meta_path = RunLayout::new(source).meta();
    let Some(recorded) = read_recorded_config(&meta_path)? else {
        warn!(meta = %meta_path.display(), "no recorded configuration, replaying with defaults");
        return Ok(local);
    };

    debug!(meta = %meta_path.display(), "using recorded decision configuration");
    local.vehicle = recorded.vehicle;
    local.fusion = recorded.fusion;
    local.fsm = recorded.fsm;
    local.gate = recorded.gate;
    local.decision_loop = recorded.decision_loop;
    Ok(local)
}

fn read_recorded_config(meta_path: &Path) -> Result<Option<AutonomyBlueprint>> {
    let Ok(content) = fs::read_to_string(meta_path) else {
        return Ok(None);
    };
    let name = meta_path.display().to_string();
    let mut meta: serde_json::Value = serde_json::from_str(&content).map_err(|e| CliError::config(&name, e))?;
    let Some(config) = meta.get_mut("config").map(serde_json::Value::take) else {
        return Ok(None);
    };
    let config = serde_json::to_string(&config).map_err(|e| CliError::config(&name, e))?;
    ConfigLoader::load_from_str(&config, ConfigFormat::Json)
        .map(Some)
        .map_err(|e| CliError::config(name, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_decision_config_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorded = AutonomyBlueprint::default();
        recorded.decision_loop.tick_ms = 250;
        recorded.run.runs_root = "/elsewhere".into();
        let meta = serde_json::json!({
            "version": "1",
            "run_id": "r",
            "mode": "live",
            "created_at": "2026-01-01T00:00:00Z",
            "config": serde_json::to_value(&recorded).unwrap(),
        });
        fs::write(RunLayout::new(dir.path()).meta(), meta.to_string()).unwrap();

        let mut local = AutonomyBlueprint::default();
        local.run.runs_root = "runs-local".into();
        let merged = with_recorded_decision_config(local, dir.path()).unwrap();

        assert_eq!(merged.decision_loop.tick_ms, 250);
        assert_eq!(merged.run.runs_root, std::path::PathBuf::from("runs-local"));
    }

    #[test]
    fn test_missing_meta_keeps_local_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut local = AutonomyBlueprint::default();
        local.decision_loop.tick_ms = 40;
        let merged = with_recorded_decision_config(local, dir.path()).unwrap();
        assert_eq!(merged.decision_loop.tick_ms, 40);
    }
}

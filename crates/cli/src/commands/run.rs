//! `run` command implementation.

use std::time::Duration;

use contracts::AutonomyBlueprint;
use tracing::{info, warn};

use super::{print_outcome, shutdown_signal};
use crate::cli::RunArgs;
use crate::error::Result;

/// Execute the `run` command
pub async fn run_live(args: &RunArgs, mut blueprint: AutonomyBlueprint) -> Result<()> {
    if args.no_record_inputs {
        blueprint.run.record_inputs = false;
    }
    if blueprint.sources.is_empty() {
        warn!("no sources configured, the vehicle will only hold");
    }

    let duration = (args.duration > 0).then(|| Duration::from_secs(args.duration));
    info!(
        vehicle = %blueprint.vehicle.name,
        tick_ms = blueprint.decision_loop.tick_ms,
        sources = blueprint.sources.len(),
        sinks = blueprint.sinks.len(),
        duration_s = args.duration,
        "starting live run"
    );

    let outcome = runtime::run_live(&blueprint, duration, shutdown_signal()).await?;

    info!(
        run_id = %outcome.run_id,
        ticks = outcome.summary.ticks,
        commands = outcome.summary.emitted_commands(),
        interrupted = outcome.interrupted,
        "live run finished"
    );
    print_outcome(&outcome);
    Ok(())
}

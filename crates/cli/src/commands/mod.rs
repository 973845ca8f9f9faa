//! Command implementations.

mod info;
mod replay;
mod run;
mod validate_run;

pub use info::run_info;
pub use replay::run_replay;
pub use run::run_live;
pub use validate_run::run_validate;

use config_loader::ConfigLoader;
use contracts::AutonomyBlueprint;
use runtime::RunOutcome;
use tracing::{info, warn};

use crate::cli::ConfigArgs;
use crate::error::{CliError, Result};

/// Load the configuration file, or built-in defaults, then apply CLI overrides
pub fn load_blueprint(args: &ConfigArgs) -> Result<AutonomyBlueprint> {
    let mut blueprint = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config(path.display().to_string(), "file not found"));
            }
            ConfigLoader::load_from_path(path).map_err(|e| CliError::config(path.display().to_string(), e))?
        }
        None => AutonomyBlueprint::default(),
    };

    if let Some(runs_root) = &args.runs_root {
        blueprint.run.runs_root = runs_root.clone();
    }
    Ok(blueprint)
}

/// Resolves on Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed never resolves; the run then ends by
/// duration or end of input only.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

/// Print the end-of-run summary to stdout
pub fn print_outcome(outcome: &RunOutcome) {
    println!();
    println!("{}", outcome.summary);
    println!("Run: {} ({})", outcome.run_id, outcome.run_dir.display());
    if outcome.interrupted {
        println!("Ended by shutdown signal");
    }

    if !outcome.streams.is_empty() {
        println!("\nInput streams:");
        for (stream, stats) in &outcome.streams {
            println!(
                "  {:<10} records={:<6} malformed={:<4} out_of_order={}",
                stream.to_string(),
                stats.records,
                stats.malformed,
                stats.out_of_order
            );
        }
    }

    if !outcome.sinks.is_empty() {
        println!("\nSinks:");
        for (name, m) in &outcome.sinks {
            println!(
                "  {:<12} written={:<6} failed={:<4} dropped={}",
                name, m.write_count, m.failure_count, m.dropped_count
            );
        }
    }
    println!();
}

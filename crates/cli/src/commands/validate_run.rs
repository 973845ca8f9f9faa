//! `validate-run` command implementation.

use anyhow::Context;
use contracts::AutonomyBlueprint;
use replay_engine::{resolve_run_dir, validate_run, RunReport};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateRunArgs;
use crate::error::{CliError, Result};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult<'a> {
    valid: bool,
    strict: bool,
    total_records: u64,
    #[serde(flatten)]
    report: &'a RunReport,
}

/// Execute the `validate-run` command
pub fn run_validate(args: &ValidateRunArgs, blueprint: &AutonomyBlueprint) -> Result<()> {
    let root = resolve_run_dir(&blueprint.run.runs_root, &args.run)?;
    info!(run = %root.display(), strict = args.strict, "validating run");

    let report = validate_run(&root)?;
    let valid = report.is_valid(args.strict);

    if args.json {
        let result = ValidationResult {
            valid,
            strict: args.strict,
            total_records: report.total_records(),
            report: &report,
        };
        let json = serde_json::to_string_pretty(&result).context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print!("{report}");
        if valid {
            println!("✓ Run is valid ({} records)", report.total_records());
        } else {
            println!("✗ Run is invalid");
        }
    }

    if valid {
        Ok(())
    } else {
        Err(CliError::RunInvalid { path: root })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ConfigArgs;
    use contracts::RunLayout;
    use std::fs;

    fn args(run: &str, strict: bool) -> ValidateRunArgs {
        ValidateRunArgs {
            run: run.to_string(),
            config: ConfigArgs {
                config: None,
                runs_root: None,
            },
            strict,
            json: true,
        }
    }

    fn write_minimal_run(root: &std::path::Path) {
        let layout = RunLayout::new(root);
        fs::create_dir_all(layout.observations_dir()).unwrap();
        fs::write(layout.telemetry(), "{\"mono_ms\":1,\"link_status\":\"OK\"}\n").unwrap();
        fs::write(
            layout.observation(contracts::SourceKind::Vision),
            "{\"mono_ms\":1,\"bearing_deg\":10.0,\"confidence\":0.9,\"status\":\"OK\"}\n",
        )
        .unwrap();
    }

    #[test]
    fn test_minimal_run_passes_lenient_fails_strict() {
        let dir = tempfile::tempdir().unwrap();
        write_minimal_run(dir.path());
        let blueprint = AutonomyBlueprint::default();
        let run = dir.path().display().to_string();

        assert!(run_validate(&args(&run, false), &blueprint).is_ok());
        let err = run_validate(&args(&run, true), &blueprint).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_unknown_run_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut blueprint = AutonomyBlueprint::default();
        blueprint.run.runs_root = dir.path().to_path_buf();
        let err = run_validate(&args("20990101_000000_deadbeef", false), &blueprint).unwrap_err();
        assert!(matches!(err, CliError::Replay(_)));
    }
}

//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// UAV companion autonomy core - fusion, decision FSM and command safety gate
#[derive(Parser, Debug)]
#[command(
    name = "uav-companion",
    author,
    version,
    about = "UAV companion-computer autonomy core",
    long_about = "Fuses target bearings from vision, thermal and audio sources, drives a \n\
                  search / scan / lock state machine and forwards only gate-approved \n\
                  commands to the configured sinks. Every run is recorded and can be \n\
                  replayed deterministically."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "UAV_COMPANION_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (overrides `observability.log_format`)
    #[arg(long, value_enum, global = true, env = "UAV_COMPANION_LOG_FORMAT")]
    pub log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default filter level when `RUST_LOG` is not set
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run live with the configured mock producers
    Run(RunArgs),

    /// Replay a recorded run through the decision pipeline
    Replay(ReplayArgs),

    /// Check a run directory for completeness and ordering
    ValidateRun(ValidateRunArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Configuration source shared by every command
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "UAV_COMPANION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override `run.runs_root`
    #[arg(long, env = "UAV_COMPANION_RUNS_ROOT")]
    pub runs_root: Option<PathBuf>,
}

/// Arguments for the `run` command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Stop after this many seconds (0 = until Ctrl-C)
    #[arg(short, long, default_value = "0", env = "UAV_COMPANION_DURATION")]
    pub duration: u64,

    /// Do not record input streams into the run directory
    #[arg(long)]
    pub no_record_inputs: bool,

    /// Override `observability.metrics_addr`, e.g. 0.0.0.0:9000
    #[arg(long, env = "UAV_COMPANION_METRICS_ADDR")]
    pub metrics_addr: Option<String>,
}

/// Arguments for the `replay` command
#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Run to replay: `latest`, a run id under the runs root, or a path
    pub run: String,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Playback speed multiplier (0 = as fast as possible)
    #[arg(long)]
    pub speed: Option<f64>,

    /// Directory for the replay's audit files (default: a new run under the runs root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// What to do when one input stream ends before the others
    #[arg(long, value_enum)]
    pub end_of_stream: Option<EndOfStreamArg>,
}

/// Arguments for the `validate-run` command
#[derive(Args, Debug, Clone)]
pub struct ValidateRunArgs {
    /// Run to check: `latest`, a run id under the runs root, or a path
    pub run: String,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Also fail on malformed lines and missing optional files
    #[arg(long)]
    pub strict: bool,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output the full effective configuration as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogFormatArg {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormatArg> for contracts::LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Json => Self::Json,
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Compact => Self::Compact,
        }
    }
}

/// End-of-stream policy for replay
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum EndOfStreamArg {
    /// Stop as soon as any stream is exhausted
    Stop,
    /// Keep going until every stream is exhausted
    HoldLast,
}

impl From<EndOfStreamArg> for contracts::EndOfStreamPolicy {
    fn from(arg: EndOfStreamArg) -> Self {
        match arg {
            EndOfStreamArg::Stop => Self::Stop,
            EndOfStreamArg::HoldLast => Self::HoldLast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_replay() {
        let cli = Cli::try_parse_from([
            "uav-companion",
            "-v",
            "replay",
            "latest",
            "--speed",
            "0",
            "--end-of-stream",
            "stop",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), "debug");
        match cli.command {
            Commands::Replay(args) => {
                assert_eq!(args.run, "latest");
                assert_eq!(args.speed, Some(0.0));
                assert!(matches!(args.end_of_stream, Some(EndOfStreamArg::Stop)));
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["uav-companion", "-q", "-v", "info"]).is_err());
    }
}

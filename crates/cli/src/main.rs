//! # UAV Companion CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与覆盖
//! - Live 运行与确定性回放
//! - 运行目录校验
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use cli::{Cli, Commands, ConfigArgs};
use commands::{load_blueprint, run_info, run_live, run_replay, run_validate};
use error::Result;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match execute(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn execute(cli: &Cli) -> Result<()> {
    let mut blueprint = load_blueprint(config_args(&cli.command))?;

    if let Some(format) = cli.log_format {
        blueprint.observability.log_format = format.into();
    }
    if let Commands::Run(args) = &cli.command {
        if let Some(addr) = &args.metrics_addr {
            blueprint.observability.metrics_addr = Some(addr.clone());
        }
    }

    // Only runs expose the metrics endpoint
    match &cli.command {
        Commands::Run(_) | Commands::Replay(_) => observability::init(&blueprint.observability, cli.log_level())?,
        _ => observability::init_tracing(blueprint.observability.log_format, cli.log_level())?,
    }

    info!(version = env!("CARGO_PKG_VERSION"), "UAV companion starting");

    match &cli.command {
        Commands::Run(args) => run_live(args, blueprint).await,
        Commands::Replay(args) => run_replay(args, blueprint).await,
        Commands::ValidateRun(args) => run_validate(args, &blueprint),
        Commands::Info(args) => run_info(args, &blueprint),
    }
}

fn config_args(command: &Commands) -> &ConfigArgs {
    match command {
        Commands::Run(args) => &args.config,
        Commands::Replay(args) => &args.config,
        Commands::ValidateRun(args) => &args.config,
        Commands::Info(args) => &args.config,
    }
}

//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标 + 运行摘要。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON / Pretty / Compact 格式，`RUST_LOG` 覆盖)
//! - 可选的 Prometheus exporter
//! - 决策循环指标与运行结束摘要
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{init, RunMetricsAggregator};
//!
//! observability::init(&blueprint.observability, "info")?;
//!
//! let mut aggregator = RunMetricsAggregator::new();
//! aggregator.record_tick(3.2, false);
//! println!("{}", aggregator.summary());
//! ```

pub mod metrics;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use contracts::{LogFormat, ObservabilityConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-exports
pub use crate::metrics::{
    record_tick_duration_ms, record_tick_overrun, RunMetricsAggregator, RunSummary, RunningStats,
    StatsSummary,
};

/// 初始化可观测性（Tracing + 可选 Prometheus）
///
/// `default_level` 在未设置 `RUST_LOG` 时生效。
pub fn init(config: &ObservabilityConfig, default_level: &str) -> Result<()> {
    init_tracing(config.log_format, default_level)?;

    if let Some(addr) = &config.metrics_addr {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("Invalid metrics address '{addr}'"))?;
        init_metrics_only(addr)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_addr = ?config.metrics_addr,
        "Observability initialized"
    );

    Ok(())
}

/// 仅初始化 Tracing
pub fn init_tracing(log_format: LogFormat, default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_target(false))
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
    }

    Ok(())
}

/// 仅初始化 Prometheus 指标（不初始化 Tracing）
pub fn init_metrics_only(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(%addr, "Prometheus metrics endpoint initialized");
    Ok(())
}

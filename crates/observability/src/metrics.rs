//! 决策循环指标与运行摘要
//!
//! `metrics` facade 负责对外导出；[`RunMetricsAggregator`] 在进程内聚合，
//! 运行结束时打印摘要。

use std::collections::BTreeMap;
use std::fmt;

use metrics::{counter, histogram};

/// 记录一次 tick 的耗时
pub fn record_tick_duration_ms(ms: f64) {
    histogram!("decision_tick_duration_ms").record(ms);
}

/// 记录一次 tick 超时
pub fn record_tick_overrun() {
    counter!("decision_tick_overruns_total").increment(1);
}

/// 运行指标聚合器
#[derive(Debug, Clone, Default)]
pub struct RunMetricsAggregator {
    ticks: u64,
    overruns: u64,
    tick_ms: RunningStats,
    transitions: u64,
    final_state: Option<String>,
    outcomes: BTreeMap<String, u64>,
    commands: BTreeMap<String, u64>,
    events: BTreeMap<String, u64>,
}

impl RunMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&mut self, duration_ms: f64, overrun: bool) {
        self.ticks += 1;
        self.tick_ms.push(duration_ms);
        if overrun {
            self.overruns += 1;
        }
    }

    pub fn record_state(&mut self, state: &str, transitioned: bool) {
        if transitioned {
            self.transitions += 1;
        }
        if self.final_state.as_deref() != Some(state) {
            self.final_state = Some(state.to_string());
        }
    }

    /// Gate outcome, plus the emitted command type if any.
    pub fn record_gate(&mut self, outcome: &str, command: Option<&str>) {
        *self.outcomes.entry(outcome.to_string()).or_default() += 1;
        if let Some(command) = command {
            *self.commands.entry(command.to_string()).or_default() += 1;
        }
    }

    pub fn record_event(&mut self, event_type: &str) {
        *self.events.entry(event_type.to_string()).or_default() += 1;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.ticks,
            overruns: self.overruns,
            tick_ms: StatsSummary::from(&self.tick_ms),
            transitions: self.transitions,
            final_state: self.final_state.clone(),
            outcomes: self.outcomes.clone(),
            commands: self.commands.clone(),
            events: self.events.clone(),
        }
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub ticks: u64,
    pub overruns: u64,
    pub tick_ms: StatsSummary,
    pub transitions: u64,
    pub final_state: Option<String>,
    pub outcomes: BTreeMap<String, u64>,
    pub commands: BTreeMap<String, u64>,
    pub events: BTreeMap<String, u64>,
}

impl RunSummary {
    pub fn emitted_commands(&self) -> u64 {
        self.commands.values().sum()
    }
}

fn write_counts(f: &mut fmt::Formatter<'_>, title: &str, counts: &BTreeMap<String, u64>) -> fmt::Result {
    if counts.is_empty() {
        return Ok(());
    }
    writeln!(f, "{title}:")?;
    for (name, count) in counts {
        writeln!(f, "  {name}: {count}")?;
    }
    Ok(())
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Run Summary ===")?;
        writeln!(f, "Ticks: {} (overruns: {})", self.ticks, self.overruns)?;
        writeln!(f, "Tick duration (ms): {}", self.tick_ms)?;
        writeln!(
            f,
            "FSM transitions: {} (final state: {})",
            self.transitions,
            self.final_state.as_deref().unwrap_or("-")
        )?;
        writeln!(f, "Commands emitted: {}", self.emitted_commands())?;
        write_counts(f, "Gate outcomes", &self.outcomes)?;
        write_counts(f, "Commands by type", &self.commands)?;
        write_counts(f, "Events", &self.events)
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// 在线统计 (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_counts() {
        let mut agg = RunMetricsAggregator::new();
        agg.record_tick(2.0, false);
        agg.record_tick(150.0, true);
        agg.record_state("SEARCH", false);
        agg.record_state("SCAN", true);
        agg.record_gate("FORWARDED", Some("SET_YAW"));
        agg.record_gate("RATE_LIMITED", None);
        agg.record_gate("SUBSTITUTED", Some("STOP"));
        agg.record_event("MODE_CHANGED");

        let summary = agg.summary();
        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.overruns, 1);
        assert_eq!(summary.transitions, 1);
        assert_eq!(summary.final_state.as_deref(), Some("SCAN"));
        assert_eq!(summary.emitted_commands(), 2);
        assert_eq!(summary.outcomes.get("RATE_LIMITED"), Some(&1));
    }

    #[test]
    fn test_summary_display() {
        let mut agg = RunMetricsAggregator::new();
        agg.record_tick(4.0, false);
        agg.record_gate("FORWARDED", Some("SET_YAW"));

        let output = agg.summary().to_string();
        assert!(output.contains("Ticks: 1 (overruns: 0)"));
        assert!(output.contains("SET_YAW: 1"));
        assert!(!output.contains("Events:"));
        assert_eq!(StatsSummary::default().to_string(), "N/A");
    }
}

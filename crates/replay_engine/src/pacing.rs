//! 回放节奏控制
//!
//! 只决定“何时”处理下一条记录，不影响处理结果。

use std::time::Duration;

use contracts::ReplayConfig;
use tokio::time::Instant;

use crate::error::{ReplayError, Result};

/// Maps record time to wall time at a speed multiplier.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    speed: f64,
    origin_mono: u64,
    started: Instant,
}

impl Pacer {
    /// `speed` 0 replays as fast as possible.
    pub fn new(speed: f64, origin_mono: u64) -> Result<Self> {
        if !ReplayConfig::is_valid_speed(speed) {
            return Err(ReplayError::InvalidSpeed(speed));
        }
        Ok(Self {
            speed,
            origin_mono,
            started: Instant::now(),
        })
    }

    pub fn is_unpaced(&self) -> bool {
        self.speed == 0.0
    }

    /// Wall-clock deadline for record time `mono_ms`.
    ///
    /// `None` when unpaced, or when the deadline is beyond what the clock
    /// can represent.
    pub fn deadline(&self, mono_ms: u64) -> Option<Instant> {
        if self.is_unpaced() {
            return None;
        }
        let offset_ms = mono_ms.saturating_sub(self.origin_mono) as f64;
        let wait = Duration::try_from_secs_f64(offset_ms / 1000.0 / self.speed).ok()?;
        self.started.checked_add(wait)
    }

    /// Sleep until `mono_ms` is due.
    pub async fn wait_until(&self, mono_ms: u64) {
        if let Some(deadline) = self.deadline(mono_ms) {
            tokio::time::sleep_until(deadline).await;
        }
    }
}

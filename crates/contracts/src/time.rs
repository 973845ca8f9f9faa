//! 时间基准
//!
//! 每条记录同时携带 epoch 时间（仅用于展示/日志）和单调时间（用于排序、超时、陈旧判断）。
//! 单调时间以毫秒为单位，从进程启动（或录制起点）开始计数。

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Schema version stamped on every record written by this workspace.
pub const SCHEMA_VERSION: &str = "0.1";

pub(crate) fn default_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Dual timestamp carried by every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct RecordTime {
    /// Wall-clock milliseconds since the Unix epoch. Display only.
    pub epoch_ms: i64,
    /// Monotonic milliseconds. All ordering and timeout math uses this.
    pub mono_ms: u64,
}

impl RecordTime {
    pub const fn new(epoch_ms: i64, mono_ms: u64) -> Self {
        Self { epoch_ms, mono_ms }
    }

    /// Milliseconds elapsed from `earlier` to `self`, saturating at zero.
    #[inline]
    pub fn since(&self, earlier: &RecordTime) -> u64 {
        self.mono_ms.saturating_sub(earlier.mono_ms)
    }

    /// Shift both clocks forward by `ms`.
    pub fn advanced_by(&self, ms: u64) -> Self {
        Self {
            epoch_ms: self.epoch_ms.saturating_add(ms as i64),
            mono_ms: self.mono_ms.saturating_add(ms),
        }
    }
}

/// Source of [`RecordTime`] for the decision loop and producers.
pub trait Clock: Send + Sync {
    fn now(&self) -> RecordTime;
}

/// Process clock: monotonic since first use, epoch from the system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

fn process_start() -> Instant {
    static START: OnceLock<Instant> = OnceLock::new();
    *START.get_or_init(Instant::now)
}

impl Clock for SystemClock {
    fn now(&self) -> RecordTime {
        let mono_ms = process_start().elapsed().as_millis() as u64;
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        RecordTime { epoch_ms, mono_ms }
    }
}

/// Explicitly advanced clock.
///
/// 回放和测试使用：时间只随记录时间戳推进，与墙钟无关，保证结果确定。
#[derive(Debug, Default)]
pub struct ManualClock {
    epoch_ms: AtomicI64,
    mono_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(start: RecordTime) -> Self {
        Self {
            epoch_ms: AtomicI64::new(start.epoch_ms),
            mono_ms: AtomicU64::new(start.mono_ms),
        }
    }

    pub fn set(&self, time: RecordTime) {
        self.epoch_ms.store(time.epoch_ms, Ordering::SeqCst);
        self.mono_ms.store(time.mono_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.mono_ms.fetch_add(ms, Ordering::SeqCst);
        self.epoch_ms.fetch_add(ms as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> RecordTime {
        RecordTime {
            epoch_ms: self.epoch_ms.load(Ordering::SeqCst),
            mono_ms: self.mono_ms.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_both_axes() {
        let clock = ManualClock::new(RecordTime::new(1_700_000_000_000, 10));
        clock.advance(250);
        let now = clock.now();
        assert_eq!(now.mono_ms, 260);
        assert_eq!(now.epoch_ms, 1_700_000_000_250);
    }

    #[test]
    fn test_since_saturates() {
        let a = RecordTime::new(0, 100);
        let b = RecordTime::new(0, 40);
        assert_eq!(a.since(&b), 60);
        assert_eq!(b.since(&a), 0);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second.mono_ms >= first.mono_ms);
    }
}

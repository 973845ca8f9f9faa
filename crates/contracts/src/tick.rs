//! TickMark - 决策循环的时间表 (ticks.jsonl)
//!
//! live 的 tick 由墙钟 interval 驱动，相位与输入记录无关。每个 tick
//! 的时间（以及迟到、最终 STOP）都写进时间表，回放按它重放同样的 tick。

use serde::{Deserialize, Serialize};

use crate::time::default_version;
use crate::RecordTime;

/// One line of `ticks.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickMark {
    #[serde(default = "default_version")]
    pub version: String,
    pub time: RecordTime,
    /// Tick index; for the stop mark, the number of ticks run
    pub tick: u64,
    /// The tick started this late (overrun)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_ms: Option<u64>,
    /// Present on the final line only: when and why the final STOP went out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl TickMark {
    pub fn tick(time: RecordTime, tick: u64, late_ms: Option<u64>) -> Self {
        Self {
            version: default_version(),
            time,
            tick,
            late_ms,
            stop_reason: None,
        }
    }

    pub fn stop(time: RecordTime, ticks: u64, reason: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            time,
            tick: ticks,
            late_ms: None,
            stop_reason: Some(reason.into()),
        }
    }

    pub fn is_stop(&self) -> bool {
        self.stop_reason.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_mark_json_shape() {
        let mark = TickMark::tick(RecordTime::new(1, 10_040), 3, None);
        let json = serde_json::to_string(&mark).unwrap();
        assert_eq!(json, r#"{"version":"0.1","time":{"epoch_ms":1,"mono_ms":10040},"tick":3}"#);

        let late: TickMark = serde_json::from_str(r#"{"time":{"epoch_ms":1,"mono_ms":5},"tick":0,"late_ms":250}"#).unwrap();
        assert_eq!(late.late_ms, Some(250));
        assert!(!late.is_stop());

        let stop = TickMark::stop(RecordTime::new(1, 10_500), 5, "run complete");
        let back: TickMark = serde_json::from_str(&serde_json::to_string(&stop).unwrap()).unwrap();
        assert!(back.is_stop());
        assert_eq!(back, stop);
    }
}

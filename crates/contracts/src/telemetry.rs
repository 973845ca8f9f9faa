//! TelemetryState - 飞控链路快照
//!
//! 核心只依赖 `link_status` 与单调时间戳，姿态/电池/位置为可选透传字段。

use serde::{Deserialize, Serialize};

use crate::time::default_version;
use crate::RecordTime;

/// Health of the telemetry channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    Ok,
    Degraded,
    Lost,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Ok => "OK",
            LinkStatus::Degraded => "DEGRADED",
            LinkStatus::Lost => "LOST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    pub voltage_v: f64,
    #[serde(default)]
    pub remaining_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    pub alt_m: f64,
}

/// 遥测快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryState {
    #[serde(default = "default_version")]
    pub version: String,
    pub time: RecordTime,
    pub link_status: LinkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attitude: Option<Attitude>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<Battery>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "gps")]
    pub position: Option<Position>,
}

impl TelemetryState {
    pub fn new(time: RecordTime, link_status: LinkStatus) -> Self {
        Self {
            version: default_version(),
            time,
            link_status,
            attitude: None,
            battery: None,
            position: None,
        }
    }
}

/// Link status as seen at `now`: missing or stale snapshots count as LOST.
pub fn effective_link(telemetry: Option<&TelemetryState>, now: &RecordTime, stale_ms: u64) -> LinkStatus {
    match telemetry {
        Some(state) if now.since(&state.time) <= stale_ms => state.link_status,
        _ => LinkStatus::Lost,
    }
}

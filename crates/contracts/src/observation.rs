//! Observation / FusedObservation - 感知输入与融合输出
//!
//! 感知协作方（视觉、热成像、声学测向）产出 [`Observation`]，
//! Fusion Engine 每个周期产出一个 [`FusedObservation`]。

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::default_version;
use crate::RecordTime;

/// Observation producer.
///
/// Declaration order is the fixed tie-break order used by fusion and replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vision,
    Thermal,
    Audio,
    Fusion,
}

impl SourceKind {
    /// Sources that feed the fusion engine, in priority tie-break order.
    pub const OBSERVED: [SourceKind; 3] = [SourceKind::Vision, SourceKind::Thermal, SourceKind::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Vision => "vision",
            SourceKind::Thermal => "thermal",
            SourceKind::Audio => "audio",
            SourceKind::Fusion => "fusion",
        }
    }

    /// Slot index for observed sources; `None` for `Fusion`.
    pub fn slot_index(&self) -> Option<usize> {
        match self {
            SourceKind::Vision => Some(0),
            SourceKind::Thermal => Some(1),
            SourceKind::Audio => Some(2),
            SourceKind::Fusion => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-record quality flag.
///
/// 音频 DOA 发出的 `LOW_CONFIDENCE` 解析为 `Degraded`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationStatus {
    Ok,
    #[serde(alias = "LOW_CONFIDENCE")]
    Degraded,
    Invalid,
    NoSignal,
}

impl ObservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationStatus::Ok => "OK",
            ObservationStatus::Degraded => "DEGRADED",
            ObservationStatus::Invalid => "INVALID",
            ObservationStatus::NoSignal => "NO_SIGNAL",
        }
    }
}

/// Pixel region of a detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// 单个感知源的方位观测
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default = "default_version")]
    pub version: String,

    pub time: RecordTime,

    pub source: SourceKind,

    /// 相对机头顺时针方位角，[0, 360)
    #[serde(default)]
    pub bearing_deg: Option<f64>,

    /// 置信度，[0, 1]
    #[serde(default)]
    pub confidence: Option<f64>,

    pub status: ObservationStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,

    /// 协作方附带的其他元数据，原样透传
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Observation {
    pub fn new(
        source: SourceKind,
        time: RecordTime,
        bearing_deg: Option<f64>,
        confidence: Option<f64>,
        status: ObservationStatus,
    ) -> Self {
        Self {
            version: default_version(),
            time,
            source,
            bearing_deg,
            confidence,
            status,
            region: None,
            extras: None,
        }
    }

    /// An OK observation with a bearing.
    pub fn ok(source: SourceKind, time: RecordTime, bearing_deg: f64, confidence: f64) -> Self {
        Self::new(
            source,
            time,
            Some(bearing_deg),
            Some(confidence),
            ObservationStatus::Ok,
        )
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }
}

/// Output of one fusion cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedObservation {
    #[serde(default = "default_version")]
    pub version: String,
    pub time: RecordTime,
    pub bearing_deg: Option<f64>,
    pub confidence: f64,
    pub status: ObservationStatus,
    pub contributing_sources: BTreeSet<SourceKind>,
}

impl FusedObservation {
    /// Cycle with nothing usable.
    pub fn empty(time: RecordTime, status: ObservationStatus) -> Self {
        Self {
            version: default_version(),
            time,
            bearing_deg: None,
            confidence: 0.0,
            status,
            contributing_sources: BTreeSet::new(),
        }
    }

    pub fn has_signal(&self) -> bool {
        self.bearing_deg.is_some()
    }
}

/// Wrap any finite angle into [0, 360).
pub fn normalize_bearing(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Smallest absolute difference between two bearings, in [0, 180].
pub fn angular_distance(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    diff.min(360.0 - diff)
}

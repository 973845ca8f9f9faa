//! Event - 运行事件记录 (events.jsonl)

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::default_version;
use crate::RecordTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ModeChanged,
    LinkLost,
    LinkRecovered,
    TargetAcquired,
    TargetLost,
    TickOverrun,
    OperatorRequest,
    Shutdown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ModeChanged => "MODE_CHANGED",
            EventType::LinkLost => "LINK_LOST",
            EventType::LinkRecovered => "LINK_RECOVERED",
            EventType::TargetAcquired => "TARGET_ACQUIRED",
            EventType::TargetLost => "TARGET_LOST",
            EventType::TickOverrun => "TICK_OVERRUN",
            EventType::OperatorRequest => "OPERATOR_REQUEST",
            EventType::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default = "default_version")]
    pub version: String,
    pub time: RecordTime,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub severity: Severity,
    #[serde(default)]
    pub note: String,
}

impl Event {
    pub fn new(time: RecordTime, event_type: EventType, severity: Severity, note: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            time,
            event_type,
            severity,
            note: note.into(),
        }
    }

    pub fn info(time: RecordTime, event_type: EventType, note: impl Into<String>) -> Self {
        Self::new(time, event_type, Severity::Info, note)
    }

    pub fn warn(time: RecordTime, event_type: EventType, note: impl Into<String>) -> Self {
        Self::new(time, event_type, Severity::Warn, note)
    }
}

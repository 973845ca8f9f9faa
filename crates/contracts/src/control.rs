//! Intent / Command 类型 / 操作员请求 / FSM 状态
//!
//! Intent 是未经安全检查的行为请求，只能交给 Command Safety Gate 评估。
//! Command 本体由 gate crate 定义（构造函数不对外开放），这里只放其类型标签与参数。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::default_version;
use crate::RecordTime;

/// Decision FSM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FsmState {
    #[default]
    Search,
    Scan,
    Locked,
    Degraded,
}

impl FsmState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FsmState::Search => "SEARCH",
            FsmState::Scan => "SCAN",
            FsmState::Locked => "LOCKED",
            FsmState::Degraded => "DEGRADED",
        }
    }

    /// Gauge value, ordered from safest to most engaged.
    pub fn level(&self) -> f64 {
        match self {
            FsmState::Degraded => 0.0,
            FsmState::Search => 1.0,
            FsmState::Scan => 2.0,
            FsmState::Locked => 3.0,
        }
    }
}

impl fmt::Display for FsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who asked for an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentOrigin {
    Fsm,
    Operator,
}

/// Requested behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    Hold,
    Stop,
    ScanToward { bearing_deg: f64 },
    LockTrack { bearing_deg: f64 },
    YawNudge { delta_deg: f64 },
    SetVelocity { north_m_s: f64, east_m_s: f64, down_m_s: f64 },
    SetMode { mode: String },
    Arm,
    Disarm,
}

impl IntentKind {
    pub fn label(&self) -> &'static str {
        match self {
            IntentKind::Hold => "HOLD",
            IntentKind::Stop => "STOP",
            IntentKind::ScanToward { .. } => "SCAN_TOWARD",
            IntentKind::LockTrack { .. } => "LOCK_TRACK",
            IntentKind::YawNudge { .. } => "YAW_NUDGE",
            IntentKind::SetVelocity { .. } => "SET_VELOCITY",
            IntentKind::SetMode { .. } => "SET_MODE",
            IntentKind::Arm => "ARM",
            IntentKind::Disarm => "DISARM",
        }
    }
}

/// 待 gate 评估的行为请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(flatten)]
    pub kind: IntentKind,
    pub origin: IntentOrigin,
    pub requested_at: RecordTime,
}

impl Intent {
    pub fn from_fsm(kind: IntentKind, requested_at: RecordTime) -> Self {
        Self {
            kind,
            origin: IntentOrigin::Fsm,
            requested_at,
        }
    }

    pub fn hold(requested_at: RecordTime) -> Self {
        Self::from_fsm(IntentKind::Hold, requested_at)
    }
}

/// Command type tag, also used for the gate whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    Hold,
    Stop,
    SetYaw,
    SetVelocity,
    Arm,
    Disarm,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Hold => "HOLD",
            CommandType::Stop => "STOP",
            CommandType::SetYaw => "SET_YAW",
            CommandType::SetVelocity => "SET_VELOCITY",
            CommandType::Arm => "ARM",
            CommandType::Disarm => "DISARM",
        }
    }

    /// HOLD and STOP are the safe fallbacks and are never whitelisted away.
    pub fn is_safety(&self) -> bool {
        matches!(self, CommandType::Hold | CommandType::Stop)
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command payload, serialized as `"type": .., "params": {..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    Hold,
    Stop,
    SetYaw {
        yaw_deg: f64,
        yaw_rate_deg_s: f64,
        /// `yaw_deg` is a delta from the current heading
        relative: bool,
    },
    SetVelocity {
        north_m_s: f64,
        east_m_s: f64,
        down_m_s: f64,
    },
    Arm,
    Disarm,
}

impl CommandKind {
    pub fn command_type(&self) -> CommandType {
        match self {
            CommandKind::Hold => CommandType::Hold,
            CommandKind::Stop => CommandType::Stop,
            CommandKind::SetYaw { .. } => CommandType::SetYaw,
            CommandKind::SetVelocity { .. } => CommandType::SetVelocity,
            CommandKind::Arm => CommandType::Arm,
            CommandKind::Disarm => CommandType::Disarm,
        }
    }
}

/// Limits in force when a command was issued.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommandLimits {
    pub max_yaw_rate_deg_s: f64,
    pub max_speed_m_s: f64,
    pub ttl_ms: u64,
}

/// Operator control-surface action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorAction {
    YawNudge { delta_deg: f64 },
    SetMode { mode: String },
    SetVelocity { north_m_s: f64, east_m_s: f64, down_m_s: f64 },
    Estop,
    Arm,
    Disarm,
}

impl OperatorAction {
    pub fn label(&self) -> &'static str {
        match self {
            OperatorAction::YawNudge { .. } => "YAW_NUDGE",
            OperatorAction::SetMode { .. } => "SET_MODE",
            OperatorAction::SetVelocity { .. } => "SET_VELOCITY",
            OperatorAction::Estop => "ESTOP",
            OperatorAction::Arm => "ARM",
            OperatorAction::Disarm => "DISARM",
        }
    }
}

/// 操作员请求，经由同一 Intent/Command 通路，不能绕过 gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRequest {
    #[serde(default = "default_version")]
    pub version: String,
    pub time: RecordTime,
    #[serde(flatten)]
    pub action: OperatorAction,
}

impl OperatorRequest {
    pub fn new(time: RecordTime, action: OperatorAction) -> Self {
        Self {
            version: default_version(),
            time,
            action,
        }
    }

    pub fn to_intent(&self) -> Intent {
        let kind = match &self.action {
            OperatorAction::YawNudge { delta_deg } => IntentKind::YawNudge {
                delta_deg: *delta_deg,
            },
            OperatorAction::SetMode { mode } => IntentKind::SetMode { mode: mode.clone() },
            OperatorAction::SetVelocity {
                north_m_s,
                east_m_s,
                down_m_s,
            } => IntentKind::SetVelocity {
                north_m_s: *north_m_s,
                east_m_s: *east_m_s,
                down_m_s: *down_m_s,
            },
            OperatorAction::Estop => IntentKind::Stop,
            OperatorAction::Arm => IntentKind::Arm,
            OperatorAction::Disarm => IntentKind::Disarm,
        };
        Intent {
            kind,
            origin: IntentOrigin::Operator,
            requested_at: self.time,
        }
    }
}

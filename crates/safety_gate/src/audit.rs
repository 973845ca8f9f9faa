//! Audit trail entries (commands.jsonl).

use std::fmt;

use contracts::{Intent, RecordTime, SCHEMA_VERSION};
use serde::Serialize;

use crate::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateOutcome {
    /// Emitted as requested
    Forwarded,
    /// Emitted with numeric limits applied
    Clamped,
    /// Replaced by HOLD or STOP
    Substituted,
    /// Dropped; nothing emitted
    RateLimited,
}

impl GateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateOutcome::Forwarded => "FORWARDED",
            GateOutcome::Clamped => "CLAMPED",
            GateOutcome::Substituted => "SUBSTITUTED",
            GateOutcome::RateLimited => "RATE_LIMITED",
        }
    }
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the gate changed or dropped a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateReason {
    Whitelist,
    InvalidParams,
    RateLimit,
    TtlExpired,
    LinkUnhealthy,
    ClampedYawRate,
    ClampedVelocity,
}

impl GateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateReason::Whitelist => "WHITELIST",
            GateReason::InvalidParams => "INVALID_PARAMS",
            GateReason::RateLimit => "RATE_LIMIT",
            GateReason::TtlExpired => "TTL_EXPIRED",
            GateReason::LinkUnhealthy => "LINK_UNHEALTHY",
            GateReason::ClampedYawRate => "CLAMPED_YAW_RATE",
            GateReason::ClampedVelocity => "CLAMPED_VELOCITY",
        }
    }
}

/// One gate evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub version: &'static str,
    pub time: RecordTime,
    /// Decision loop tick index
    pub tick: u64,
    pub intent: Intent,
    pub outcome: GateOutcome,
    pub reasons: Vec<GateReason>,
    pub command: Option<Command>,
}

impl AuditEntry {
    pub(crate) fn new(time: RecordTime, tick: u64, intent: Intent) -> Self {
        Self {
            version: SCHEMA_VERSION,
            time,
            tick,
            intent,
            outcome: GateOutcome::Forwarded,
            reasons: Vec::new(),
            command: None,
        }
    }

    pub fn is_emitted(&self) -> bool {
        self.command.is_some()
    }
}

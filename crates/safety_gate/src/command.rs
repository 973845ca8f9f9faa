//! Command - 经过 gate 检查后的唯一可外发对象

use contracts::{CommandKind, CommandLimits, CommandType, IntentOrigin, RecordTime, SCHEMA_VERSION};
use serde::Serialize;

/// A command that has passed every gate check.
///
/// Fields are private and the constructor is crate-local, so a `Command`
/// value is proof that [`crate::CommandGate`] produced it. It serializes for
/// sinks and the audit log but cannot be deserialized back into existence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    version: &'static str,
    time: RecordTime,
    #[serde(flatten)]
    kind: CommandKind,
    origin: IntentOrigin,
    limits: CommandLimits,
}

impl Command {
    pub(crate) fn new(time: RecordTime, kind: CommandKind, origin: IntentOrigin, limits: CommandLimits) -> Self {
        Self {
            version: SCHEMA_VERSION,
            time,
            kind,
            origin,
            limits,
        }
    }

    pub fn version(&self) -> &str {
        self.version
    }

    /// Gate evaluation time
    pub fn time(&self) -> RecordTime {
        self.time
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    pub fn command_type(&self) -> CommandType {
        self.kind.command_type()
    }

    pub fn origin(&self) -> IntentOrigin {
        self.origin
    }

    /// Limits that were in force when the gate issued this command
    pub fn limits(&self) -> &CommandLimits {
        &self.limits
    }
}

//! LogSink - logs each command via tracing

use contracts::{CommandKind, ContractError};
use safety_gate::Command;
use tracing::{info, instrument};

use crate::sink::CommandSink;

/// Sink that logs commands, for dry runs and debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_command(&self, command: &Command) {
        let mono_ms = command.time().mono_ms;
        match command.kind() {
            CommandKind::SetYaw {
                yaw_deg,
                yaw_rate_deg_s,
                relative,
            } => info!(
                sink = %self.name,
                mono_ms,
                yaw_deg,
                yaw_rate_deg_s,
                relative,
                "SET_YAW"
            ),
            CommandKind::SetVelocity {
                north_m_s,
                east_m_s,
                down_m_s,
            } => info!(
                sink = %self.name,
                mono_ms,
                north_m_s,
                east_m_s,
                down_m_s,
                "SET_VELOCITY"
            ),
            other => info!(sink = %self.name, mono_ms, "{}", other.command_type()),
        }
    }
}

impl CommandSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_send",
        skip(self, command),
        fields(sink = %self.name, command = %command.command_type())
    )]
    async fn send(&mut self, command: &Command) -> Result<(), ContractError> {
        self.log_command(command);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

//! CommandSink trait - Dispatcher output interface
//!
//! Sinks know the transport; the gate does not.

use contracts::ContractError;
use safety_gate::Command;

/// Command output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(CommandSink: Send)]
pub trait LocalCommandSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one command
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn send(&mut self, command: &Command) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}

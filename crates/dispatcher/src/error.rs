//! Dispatcher error types

use std::path::PathBuf;

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Run directory could not be prepared
    #[error("failed to prepare run directory {path}: {source}")]
    RunDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record serialization error
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Sink write error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn run_directory(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::RunDirectory {
            path: path.into(),
            source,
        }
    }
}

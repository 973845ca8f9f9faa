//! Error types for CLI operations.

use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration could not be loaded or failed validation
    #[error("invalid configuration {source_name}: {message}")]
    Config {
        source_name: String,
        message: String,
    },

    /// Run directory failed `validate-run`
    #[error("run {} failed validation", path.display())]
    RunInvalid { path: PathBuf },

    /// Live or replay run failed
    #[error(transparent)]
    Runtime(#[from] runtime::RuntimeError),

    /// Recorded run could not be located or read
    #[error(transparent)]
    Replay(#[from] replay_engine::ReplayError),

    /// Generic error wrapper
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::Config {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// Process exit status: 2 for configuration, 3 for run validation, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config { .. } => 2,
            Self::RunInvalid { .. } => 3,
            _ => 1,
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

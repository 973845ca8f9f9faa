//! Runtime error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Run directory, recorder or sink setup failed
    #[error(transparent)]
    Dispatcher(#[from] dispatcher::DispatcherError),

    /// Recorded run could not be read
    #[error(transparent)]
    Replay(#[from] replay_engine::ReplayError),

    /// Replay output would overwrite the audit files of the recorded run
    #[error("replay output directory is the recorded run itself: {0}")]
    OutputIsSource(std::path::PathBuf),

    #[error("failed to serialize run metadata: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("dispatcher task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

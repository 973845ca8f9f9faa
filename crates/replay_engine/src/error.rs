//! Replay 错误类型

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("run directory not found: {0}")]
    RunNotFound(PathBuf),

    #[error("run {0} contains no replayable streams")]
    NoStreams(PathBuf),

    #[error("invalid replay speed {0}: must be 0 or a positive multiplier")]
    InvalidSpeed(f64),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReplayError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReplayError>;

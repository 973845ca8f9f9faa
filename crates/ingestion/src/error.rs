//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 记录无法解析或字段非法
    #[error("malformed {stream} record: {message}")]
    Malformed {
        /// 输入流
        stream: String,
        /// 错误消息
        message: String,
    },

    /// 输入源未在监听
    #[error("source {source_id} is not listening")]
    SourceNotListening {
        /// 输入源 ID
        source_id: String,
    },

    /// 输入源已在监听
    #[error("source {source_id} is already listening")]
    AlreadyListening {
        /// 输入源 ID
        source_id: String,
    },
}

impl IngestionError {
    pub fn malformed(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            stream: stream.into(),
            message: message.into(),
        }
    }
}

impl From<contracts::ContractError> for IngestionError {
    fn from(err: contracts::ContractError) -> Self {
        match err {
            contracts::ContractError::RecordParse { stream, message } => {
                Self::Malformed { stream, message }
            }
            other => Self::Malformed {
                stream: "unknown".into(),
                message: other.to_string(),
            },
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;

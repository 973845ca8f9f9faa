//! RecordSource trait - 输入源抽象
//!
//! 感知与遥测协作方（真实设备或 Mock）都以回调方式推送 [`InputRecord`]，
//! 与消费端（单槽缓冲）解耦。

use std::sync::Arc;

use crate::{InputRecord, StreamKind};

/// Record callback type
///
/// Uses `Arc` so the callback can be shared with a producer thread.
pub type RecordCallback = Arc<dyn Fn(InputRecord) + Send + Sync>;

/// Producer of observation, telemetry or operator records.
pub trait RecordSource: Send + Sync {
    /// Producer identifier, used for logs and metrics.
    fn source_id(&self) -> &str;

    /// Stream this producer writes.
    fn stream(&self) -> StreamKind;

    /// Start delivering records to `callback`.
    ///
    /// Calling it again while listening is a no-op.
    fn listen(&self, callback: RecordCallback);

    /// Stop producing.
    fn stop(&self);

    fn is_listening(&self) -> bool;
}

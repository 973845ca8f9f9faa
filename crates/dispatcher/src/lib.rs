//! # Dispatcher
//!
//! 命令分发与运行记录模块。
//!
//! 负责：
//! - 消费 gate 放行的 `Command`
//! - Fan-out 到多个 sinks（log / JSONL 文件 / UDP）
//! - 隔离慢 sink，不阻塞决策循环
//! - 运行目录管理与审计文件写入（`RunContext` / `RunRecorder`）

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod recorder;
pub mod sink;
pub mod sinks;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use recorder::{new_run_id, InputRecorder, JsonlWriter, RunContext, RunMeta, RunMode, RunRecorder};
pub use safety_gate::Command;
pub use sink::{CommandSink, LocalCommandSink};
pub use sinks::{FileSink, LogSink, NetworkSink};

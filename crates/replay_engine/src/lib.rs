//! # Replay Engine
//!
//! 从运行目录回放录制的输入流：
//!
//! - [`StreamCursor`]：逐行惰性读取单个 JSONL 流，丢弃并计数坏行与时间倒退的记录
//! - [`StreamMerger`]：基于二叉堆的 k 路归并，键为 `(mono_ms, 流顺序)`
//! - [`TickSchedule`]：读取录制的 tick 时间表 `ticks.jsonl`
//! - [`Pacer`]：按倍速把记录时间映射到墙钟时间（0 = 不限速）
//! - [`validate_run`]：检查运行目录完整性
//!
//! 流水线时钟始终取自记录时间戳，因此任意倍速下输出一致。

mod cursor;
mod error;
mod merge;
mod pacing;
mod schedule;
mod validate;

pub use contracts::EndOfStreamPolicy;
pub use cursor::{StreamCursor, StreamStats};
pub use error::{ReplayError, Result};
pub use merge::StreamMerger;
pub use pacing::Pacer;
pub use schedule::TickSchedule;
pub use validate::{resolve_run_dir, validate_run, RunReport, StreamReport};

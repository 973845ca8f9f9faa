//! # Runtime
//!
//! 决策循环与运行驱动。
//!
//! - [`DecisionLoop`]：每个 tick 依次执行 Fusion → FSM → Gate，写审计文件，
//!   把放行的命令交给 dispatcher
//! - [`LiveRunner`] / [`run_live`]：Mock 生产者 + 固定频率 tick
//! - [`ReplayDriver`] / [`run_replay`]：按记录时间重放，输出与倍速无关
//! - 收尾：完成当前 tick，经 gate 发出最后一个 STOP，刷新并关闭运行文件
//!
//! ## 使用示例
//!
//! ```ignore
//! let outcome = runtime::run_replay(&blueprint, &run_dir, None, shutdown_signal()).await?;
//! println!("{}", outcome.summary);
//! ```

mod decision;
mod error;
mod live;
mod replay;
mod session;

pub use decision::{DecisionLoop, TickReport};
pub use error::{Result, RuntimeError};
pub use live::{build_live_pipeline, run_live, LiveRunner};
pub use replay::{run_replay, RecordedStop, ReplayDriver, ReplayEnd};
pub use session::RunOutcome;

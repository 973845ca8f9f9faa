//! # Decision FSM
//!
//! 跟踪状态机：SEARCH → SCAN → LOCKED，任何失联都退回 DEGRADED，
//! 恢复必须经过 SEARCH 重新捕获。
//!
//! - 每个 tick 评估一次，转移由显式转移表驱动
//! - 同一 tick 多个转移同时满足时，取最保守的目标状态
//! - 遥测链路 LOST（或缺失/陈旧）时强制 HOLD 并冻结状态
//! - 产出 Intent，交由 Command Safety Gate 评估

mod events;
mod machine;
mod transitions;

pub use contracts::{FsmConfig, FsmState};
pub use events::EventThrottle;
pub use machine::{DecisionFsm, FsmOutput};
pub use transitions::{Guard, Transition, TRANSITIONS};

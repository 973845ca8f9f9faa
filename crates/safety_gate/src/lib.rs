//! # Command Safety Gate
//!
//! 唯一能构造 [`Command`] 的地方。每个 Intent 依次经过：
//!
//! 1. 类型白名单（HOLD/STOP 始终允许，ARM/DISARM 仅限操作员）
//! 2. 频率限制（滑动一秒窗口 + 最小间隔，超出直接丢弃）
//! 3. 授权有效期 TTL
//! 4. 链路健康（非 OK 时除 STOP 外一律替换为 STOP）
//! 5. 数值限幅（偏航角速度、速度模长）
//!
//! 每次评估都产出一条 [`AuditEntry`]。

mod audit;
mod command;
mod gate;
mod rate;

pub use audit::{AuditEntry, GateOutcome, GateReason};
pub use command::Command;
pub use contracts::GateConfig;
pub use gate::CommandGate;
pub use rate::RateWindow;

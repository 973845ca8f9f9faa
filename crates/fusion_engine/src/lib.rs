//! # Fusion Engine
//!
//! 多源方位融合（视觉 / 热成像 / 声学测向）。
//!
//! 负责：
//! - 陈旧与 INVALID 观测剔除
//! - 置信度 × 源优先级的信任权重
//! - 冲突检测（超出一致性容差时取最高权重源，标记 DEGRADED）
//! - 加权圆周平均（0°/360° 回绕安全）
//! - 每个周期输出一个 `FusedObservation`，从不失败
//!
//! ## 使用示例
//!
//! ```ignore
//! use fusion_engine::FusionEngine;
//!
//! let mut engine = FusionEngine::new(blueprint.fusion.clone());
//! let fused = engine.fuse(snapshot.observations.iter().flatten(), now);
//! ```

mod circular;
mod engine;

pub use circular::{weighted_circular_mean, CircularMean};
pub use contracts::{FusedObservation, FusionConfig};
pub use engine::FusionEngine;

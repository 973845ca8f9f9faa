//! AutonomyBlueprint - Config Loader 输出
//!
//! 描述完整的机载自主配置：融合、状态机、安全闸门、决策循环、回放、
//! Mock 输入源、命令输出路由、运行目录与可观测性。所有段落都有默认值，
//! 空配置文件即可运行。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{CommandType, SourceKind};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AutonomyBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    #[validate(nested)]
    pub vehicle: VehicleConfig,

    #[serde(default)]
    #[validate(nested)]
    pub fusion: FusionConfig,

    #[serde(default)]
    #[validate(nested)]
    pub fsm: FsmConfig,

    #[serde(default)]
    #[validate(nested)]
    pub gate: GateConfig,

    #[serde(default)]
    #[validate(nested)]
    pub decision_loop: LoopConfig,

    #[serde(default)]
    #[validate(nested)]
    pub replay: ReplayConfig,

    /// Live 模式下的 Mock 输入源
    #[serde(default)]
    #[validate(nested)]
    pub sources: Vec<SourceConfig>,

    /// 命令输出路由
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// 机体与链路
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VehicleConfig {
    #[serde(default = "default_vehicle_name")]
    pub name: String,

    /// 遥测快照超过该时长（毫秒）视为链路丢失
    #[serde(default = "default_telemetry_stale_ms")]
    #[validate(range(min = 1))]
    pub telemetry_stale_ms: u64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            name: default_vehicle_name(),
            telemetry_stale_ms: default_telemetry_stale_ms(),
        }
    }
}

fn default_vehicle_name() -> String {
    "uav".to_string()
}

fn default_telemetry_stale_ms() -> u64 {
    1500
}

/// Per-source priority weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct SourcePriorities {
    #[validate(range(min = 0.0))]
    pub vision: f64,
    #[validate(range(min = 0.0))]
    pub thermal: f64,
    #[validate(range(min = 0.0))]
    pub audio: f64,
}

impl SourcePriorities {
    pub fn weight(&self, source: SourceKind) -> f64 {
        match source {
            SourceKind::Vision => self.vision,
            SourceKind::Thermal => self.thermal,
            SourceKind::Audio => self.audio,
            SourceKind::Fusion => 0.0,
        }
    }
}

impl Default for SourcePriorities {
    fn default() -> Self {
        Self {
            vision: 1.0,
            thermal: 0.8,
            audio: 0.6,
        }
    }
}

/// Fusion Engine 配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FusionConfig {
    /// 观测陈旧阈值（毫秒）
    #[serde(default = "default_stale_after_ms")]
    #[validate(range(min = 1))]
    pub stale_after_ms: u64,

    /// 多源方位一致性容差（度）
    #[serde(default = "default_agreement_tolerance_deg")]
    #[validate(range(min = 0.0, max = 180.0))]
    pub agreement_tolerance_deg: f64,

    /// DEGRADED 源置信度乘数，必须 < 1
    #[serde(default = "default_degraded_penalty")]
    #[validate(range(min = 0.0, exclusive_max = 1.0))]
    pub degraded_penalty: f64,

    /// 源未给出置信度时使用的值
    #[serde(default = "default_confidence")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub default_confidence: f64,

    #[serde(default)]
    #[validate(nested)]
    pub priorities: SourcePriorities,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            stale_after_ms: default_stale_after_ms(),
            agreement_tolerance_deg: default_agreement_tolerance_deg(),
            degraded_penalty: default_degraded_penalty(),
            default_confidence: default_confidence(),
            priorities: SourcePriorities::default(),
        }
    }
}

fn default_stale_after_ms() -> u64 {
    500
}

fn default_agreement_tolerance_deg() -> f64 {
    20.0
}

fn default_degraded_penalty() -> f64 {
    0.5
}

fn default_confidence() -> f64 {
    0.5
}

/// Decision FSM 配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FsmConfig {
    #[serde(default = "default_scan_conf")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub scan_conf: f64,

    #[serde(default = "default_lock_conf")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub lock_conf: f64,

    /// lock_conf 需持续的时长（毫秒）
    #[serde(default = "default_lock_dwell_ms")]
    pub lock_dwell_ms: u64,

    #[serde(default = "default_lost_timeout_ms")]
    #[validate(range(min = 1))]
    pub lost_timeout_ms: u64,

    #[serde(default = "default_degraded_cooldown_ms")]
    pub degraded_cooldown_ms: u64,

    /// 同类事件（MODE_CHANGED 除外）的最小间隔
    #[serde(default = "default_event_cooldown_ms")]
    pub event_cooldown_ms: u64,
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            scan_conf: default_scan_conf(),
            lock_conf: default_lock_conf(),
            lock_dwell_ms: default_lock_dwell_ms(),
            lost_timeout_ms: default_lost_timeout_ms(),
            degraded_cooldown_ms: default_degraded_cooldown_ms(),
            event_cooldown_ms: default_event_cooldown_ms(),
        }
    }
}

fn default_scan_conf() -> f64 {
    0.3
}

fn default_lock_conf() -> f64 {
    0.6
}

fn default_lock_dwell_ms() -> u64 {
    500
}

fn default_lost_timeout_ms() -> u64 {
    3000
}

fn default_degraded_cooldown_ms() -> u64 {
    2000
}

fn default_event_cooldown_ms() -> u64 {
    1000
}

/// Command Safety Gate 配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GateConfig {
    /// 最大转发频率 (Hz)
    #[serde(default = "default_rate_limit_hz")]
    #[validate(range(min = 0.1, max = 1000.0))]
    pub rate_limit_hz: f64,

    /// Intent 授权有效期（毫秒）
    #[serde(default = "default_command_ttl_ms")]
    #[validate(range(min = 1))]
    pub command_ttl_ms: u64,

    /// 允许转发的命令类型；HOLD/STOP 始终允许
    #[serde(default = "default_allow_types")]
    pub allow_types: Vec<CommandType>,

    #[serde(default = "default_scan_yaw_rate")]
    #[validate(range(min = 0.0))]
    pub scan_yaw_rate_deg_s: f64,

    #[serde(default = "default_track_yaw_rate")]
    #[validate(range(min = 0.0))]
    pub track_yaw_rate_deg_s: f64,

    #[serde(default = "default_max_yaw_rate")]
    #[validate(range(min = 0.0))]
    pub max_yaw_rate_deg_s: f64,

    #[serde(default = "default_max_speed")]
    #[validate(range(min = 0.0))]
    pub max_speed_m_s: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            rate_limit_hz: default_rate_limit_hz(),
            command_ttl_ms: default_command_ttl_ms(),
            allow_types: default_allow_types(),
            scan_yaw_rate_deg_s: default_scan_yaw_rate(),
            track_yaw_rate_deg_s: default_track_yaw_rate(),
            max_yaw_rate_deg_s: default_max_yaw_rate(),
            max_speed_m_s: default_max_speed(),
        }
    }
}

fn default_rate_limit_hz() -> f64 {
    5.0
}

fn default_command_ttl_ms() -> u64 {
    1000
}

fn default_allow_types() -> Vec<CommandType> {
    vec![CommandType::SetYaw, CommandType::SetVelocity, CommandType::Stop]
}

fn default_scan_yaw_rate() -> f64 {
    30.0
}

fn default_track_yaw_rate() -> f64 {
    45.0
}

fn default_max_yaw_rate() -> f64 {
    60.0
}

fn default_max_speed() -> f64 {
    5.0
}

/// 决策循环配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoopConfig {
    #[serde(default = "default_tick_ms")]
    #[validate(range(min = 1, max = 10000))]
    pub tick_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
        }
    }
}

fn default_tick_ms() -> u64 {
    100
}

/// 数据流结束策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfStreamPolicy {
    /// 任一非空流耗尽即结束回放
    Stop,
    /// 继续回放直到所有流耗尽，已结束的流保留最后一个值
    #[default]
    HoldLast,
}

/// 最低转发频率 (Hz)，对应 10 s 的最小间隔
pub const MIN_RATE_LIMIT_HZ: f64 = 0.1;
pub const MAX_RATE_LIMIT_HZ: f64 = 1000.0;

/// 最低非零回放倍速
pub const MIN_REPLAY_SPEED: f64 = 0.01;

/// 回放配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReplayConfig {
    /// 播放倍速，0 表示不限速
    #[serde(default = "default_replay_speed")]
    #[validate(range(min = 0.0, max = 1000.0))]
    pub speed: f64,

    #[serde(default)]
    pub end_of_stream: EndOfStreamPolicy,
}

impl ReplayConfig {
    /// 0 (不限速) 或 [`MIN_REPLAY_SPEED`, 1000]
    pub fn is_valid_speed(speed: f64) -> bool {
        speed == 0.0 || (MIN_REPLAY_SPEED..=1000.0).contains(&speed)
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed: default_replay_speed(),
            end_of_stream: EndOfStreamPolicy::default(),
        }
    }
}

fn default_replay_speed() -> f64 {
    1.0
}

/// Mock 输入源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockSourceKind {
    Vision,
    Thermal,
    Audio,
    Telemetry,
}

/// 故障注入窗口
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// 启动后多久开始故障（毫秒）
    pub after_ms: u64,
    /// 故障持续时长（毫秒）
    pub duration_ms: u64,
}

/// Mock 输入源
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SourceConfig {
    pub id: String,

    pub kind: MockSourceKind,

    /// 产出频率 (Hz)，必须 > 0
    #[validate(range(exclusive_min = 0.0))]
    pub rate_hz: f64,

    /// 目标初始方位
    #[serde(default)]
    pub bearing_deg: f64,

    /// 每秒方位漂移（度）
    #[serde(default)]
    pub drift_deg_s: f64,

    #[serde(default = "default_mock_confidence")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: f64,

    /// 故障期间：观测源输出 NO_SIGNAL，遥测源输出 LOST
    #[serde(default)]
    pub fault: Option<FaultConfig>,
}

fn default_mock_confidence() -> f64 {
    0.8
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 文件输出
    File,
    /// 网络输出 (UDP)
    #[serde(alias = "udp")]
    Network,
}

/// 运行目录配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_runs_root")]
    pub runs_root: PathBuf,

    /// Live 模式是否把输入流也写入运行目录（用于之后回放）
    #[serde(default = "default_record_inputs")]
    pub record_inputs: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            runs_root: default_runs_root(),
            record_inputs: default_record_inputs(),
        }
    }
}

fn default_runs_root() -> PathBuf {
    PathBuf::from("runs")
}

fn default_record_inputs() -> bool {
    true
}

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON 结构化日志
    Json,
    /// 人类可读格式
    Pretty,
    /// 紧凑单行格式
    #[default]
    Compact,
}

/// 可观测性配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus exporter 监听地址，例如 "0.0.0.0:9000"
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

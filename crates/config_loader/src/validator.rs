//! 配置校验模块
//!
//! 校验规则：
//! - 字段取值范围 (derive 规则，见 contracts::blueprint)
//! - lock_conf >= scan_conf
//! - 回放倍速为 0 或 >= MIN_REPLAY_SPEED
//! - source id 唯一，每种输入流最多一个 Mock 源
//! - 故障窗口时长 > 0
//! - sink 名称非空且唯一，file/network sink 必填参数齐全

use std::collections::HashSet;

use contracts::{AutonomyBlueprint, ContractError, ReplayConfig, SinkType, MIN_REPLAY_SPEED};
use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 AutonomyBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &AutonomyBlueprint) -> Result<(), ContractError> {
    validate_ranges(blueprint)?;
    validate_thresholds(blueprint)?;
    validate_replay(blueprint)?;
    validate_sources(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 字段范围校验，错误路径展开为 `fusion.degraded_penalty` 形式
fn validate_ranges(blueprint: &AutonomyBlueprint) -> Result<(), ContractError> {
    match blueprint.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_error(&errors, String::new())
                .unwrap_or_else(|| ("blueprint".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

fn first_error(errors: &ValidationErrors, prefix: String) -> Option<(String, String)> {
    let mut keys: Vec<_> = errors.errors().keys().collect();
    keys.sort();

    for key in keys {
        let path = if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        };
        match &errors.errors()[key] {
            ValidationErrorsKind::Field(list) => {
                if let Some(err) = list.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} check failed", err.code));
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_error(inner, path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_error(inner, format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// 校验状态机阈值
fn validate_thresholds(blueprint: &AutonomyBlueprint) -> Result<(), ContractError> {
    let fsm = &blueprint.fsm;
    if fsm.lock_conf < fsm.scan_conf {
        return Err(ContractError::config_validation(
            "fsm.lock_conf / fsm.scan_conf",
            format!(
                "lock_conf ({}) must be >= scan_conf ({})",
                fsm.lock_conf, fsm.scan_conf
            ),
        ));
    }
    Ok(())
}

/// 校验回放倍速；极小的正倍速会把等待时间放大到无法表示
fn validate_replay(blueprint: &AutonomyBlueprint) -> Result<(), ContractError> {
    let speed = blueprint.replay.speed;
    if !ReplayConfig::is_valid_speed(speed) {
        return Err(ContractError::config_validation(
            "replay.speed",
            format!("speed must be 0 or >= {MIN_REPLAY_SPEED}, got {speed}"),
        ));
    }
    Ok(())
}

/// 校验 Mock 输入源
fn validate_sources(blueprint: &AutonomyBlueprint) -> Result<(), ContractError> {
    let mut ids = HashSet::new();
    let mut kinds = HashSet::new();
    for source in &blueprint.sources {
        if !ids.insert(&source.id) {
            return Err(ContractError::config_validation(
                format!("sources[id={}]", source.id),
                "duplicate source id",
            ));
        }
        // 每个输入流只有一个单槽缓冲，多个生产者会互相覆盖
        if !kinds.insert(source.kind) {
            return Err(ContractError::config_validation(
                format!("sources[id={}].kind", source.id),
                format!("more than one source of kind {:?}", source.kind),
            ));
        }
        if let Some(fault) = &source.fault {
            if fault.duration_ms == 0 {
                return Err(ContractError::config_validation(
                    format!("sources[id={}].fault.duration_ms", source.id),
                    "fault duration_ms must be > 0",
                ));
            }
        }
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &AutonomyBlueprint) -> Result<(), ContractError> {
    let mut names = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !names.insert(&sink.name) {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", idx),
                "queue_capacity must be > 0",
            ));
        }
        let required = match sink.sink_type {
            SinkType::Log => None,
            SinkType::File => Some("path"),
            SinkType::Network => Some("addr"),
        };
        if let Some(param) = required {
            if !sink.params.contains_key(param) {
                return Err(ContractError::config_validation(
                    format!("sinks[{}].params.{}", idx, param),
                    format!("{:?} sink requires '{}'", sink.sink_type, param),
                ));
            }
        }
    }
    Ok(())
}

//! 记录规范化
//!
//! 协作方送来的记录在进入单槽缓冲前统一检查：
//! - 方位角必须是有限数，回绕到 [0, 360)
//! - 置信度必须是有限数，截断到 [0, 1]
//! - `fusion` 是融合输出，不能作为输入源
//!
//! 不合规的记录返回 `Malformed`，由调用方记录日志并丢弃。

use contracts::{InputRecord, Observation, OperatorAction, SourceKind, StreamKind};

use crate::error::{IngestionError, Result};

/// Validate and normalize a record before it reaches a slot.
pub fn normalize(record: InputRecord) -> Result<InputRecord> {
    match record {
        InputRecord::Observation(obs) => normalize_observation(obs).map(InputRecord::Observation),
        InputRecord::Operator(request) => {
            let finite = match request.action {
                OperatorAction::YawNudge { delta_deg } => delta_deg.is_finite(),
                OperatorAction::SetVelocity {
                    north_m_s,
                    east_m_s,
                    down_m_s,
                } => [north_m_s, east_m_s, down_m_s].iter().all(|v| v.is_finite()),
                _ => true,
            };
            if !finite {
                return Err(IngestionError::malformed(
                    StreamKind::Operator.label(),
                    format!("{} parameters are not finite", request.action.label()),
                ));
            }
            Ok(InputRecord::Operator(request))
        }
        other => Ok(other),
    }
}

fn normalize_observation(mut obs: Observation) -> Result<Observation> {
    let stream = obs.source.as_str();

    if obs.source == SourceKind::Fusion {
        return Err(IngestionError::malformed(
            stream,
            "fusion output cannot be ingested as an observation",
        ));
    }

    if let Some(bearing) = obs.bearing_deg {
        if !bearing.is_finite() {
            return Err(IngestionError::malformed(stream, "bearing_deg is not finite"));
        }
        obs.bearing_deg = Some(contracts::normalize_bearing(bearing));
    }

    if let Some(confidence) = obs.confidence {
        if !confidence.is_finite() {
            return Err(IngestionError::malformed(stream, "confidence is not finite"));
        }
        obs.confidence = Some(confidence.clamp(0.0, 1.0));
    }

    Ok(obs)
}

/// Parse one JSON line of `stream` and normalize it.
pub fn parse_line(stream: StreamKind, line: &str) -> Result<InputRecord> {
    let record = contracts::parse_record(stream, line)?;
    normalize(record)
}

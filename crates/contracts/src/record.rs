//! 记录流：按行存储的 JSON 记录及其解析
//!
//! 一次运行目录中的每个输入流都对应一个 [`StreamKind`]。解析时统一时间字段，
//! 兼容 `time.mono_ms` / `time.t_mono_ms` / 顶层 `mono_ms` / 顶层 `t_mono_ms` 四种写法。

use std::fmt;

use serde_json::{Map, Value};

use crate::{ContractError, Observation, OperatorRequest, RecordTime, SourceKind, TelemetryState};

/// One input stream of a run.
///
/// `Ord` is the fixed stream order used to break timestamp ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StreamKind {
    Telemetry,
    Observation(SourceKind),
    Operator,
}

impl StreamKind {
    /// Every replayable stream, in tie-break order.
    pub const ALL: [StreamKind; 5] = [
        StreamKind::Telemetry,
        StreamKind::Observation(SourceKind::Vision),
        StreamKind::Observation(SourceKind::Thermal),
        StreamKind::Observation(SourceKind::Audio),
        StreamKind::Operator,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StreamKind::Telemetry => "telemetry",
            StreamKind::Observation(source) => source.as_str(),
            StreamKind::Operator => "operator",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A parsed input record.
#[derive(Debug, Clone, PartialEq)]
pub enum InputRecord {
    Telemetry(TelemetryState),
    Observation(Observation),
    Operator(OperatorRequest),
}

impl InputRecord {
    pub fn time(&self) -> RecordTime {
        match self {
            InputRecord::Telemetry(t) => t.time,
            InputRecord::Observation(o) => o.time,
            InputRecord::Operator(r) => r.time,
        }
    }

    pub fn stream(&self) -> StreamKind {
        match self {
            InputRecord::Telemetry(_) => StreamKind::Telemetry,
            InputRecord::Observation(o) => StreamKind::Observation(o.source),
            InputRecord::Operator(_) => StreamKind::Operator,
        }
    }
}

fn as_u64(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
}

fn as_i64(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|v| v.is_finite()).map(|v| v as i64))
}

/// Resolve the monotonic and epoch timestamps of a raw record.
///
/// Returns `None` when no monotonic timestamp can be found.
pub fn resolve_time(record: &Map<String, Value>) -> Option<RecordTime> {
    let nested = record.get("time").and_then(Value::as_object);

    let mono_ms = nested
        .and_then(|t| as_u64(t.get("mono_ms")).or_else(|| as_u64(t.get("t_mono_ms"))))
        .or_else(|| as_u64(record.get("mono_ms")))
        .or_else(|| as_u64(record.get("t_mono_ms")))?;

    let epoch_ms = nested
        .and_then(|t| as_i64(t.get("epoch_ms")).or_else(|| as_i64(t.get("t_epoch_ms"))))
        .or_else(|| as_i64(record.get("epoch_ms")))
        .unwrap_or_default();

    Some(RecordTime { epoch_ms, mono_ms })
}

/// Parse one line of a stream into a typed record.
pub fn parse_record(stream: StreamKind, line: &str) -> Result<InputRecord, ContractError> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| ContractError::record_parse(stream.label(), e.to_string()))?;
    let Value::Object(mut map) = value else {
        return Err(ContractError::record_parse(stream.label(), "record is not a JSON object"));
    };

    let time = resolve_time(&map)
        .ok_or_else(|| ContractError::record_parse(stream.label(), "missing monotonic timestamp"))?;
    map.insert(
        "time".to_string(),
        serde_json::json!({ "epoch_ms": time.epoch_ms, "mono_ms": time.mono_ms }),
    );

    if let StreamKind::Observation(source) = stream {
        map.entry("source")
            .or_insert_with(|| Value::String(source.as_str().to_string()));
    }

    let value = Value::Object(map);
    let record = match stream {
        StreamKind::Telemetry => serde_json::from_value(value).map(InputRecord::Telemetry),
        StreamKind::Observation(_) => serde_json::from_value(value).map(InputRecord::Observation),
        StreamKind::Operator => serde_json::from_value(value).map(InputRecord::Operator),
    };
    record.map_err(|e| ContractError::record_parse(stream.label(), e.to_string()))
}

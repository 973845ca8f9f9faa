//! Mock 输入源
//!
//! 没有真实感知/飞控链路时使用。按配置频率产出观测或遥测记录，
//! 支持方位漂移与故障注入（故障窗口内观测为 NO_SIGNAL，遥测为 LOST）。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    normalize_bearing, Attitude, Battery, Clock, InputRecord, LinkStatus, MockSourceKind,
    Observation, ObservationStatus, Position, RecordCallback, RecordSource, RecordTime,
    SourceConfig, SourceKind, StreamKind, TelemetryState,
};
use tracing::{debug, trace};

/// Mock 输入源
pub struct MockRecordSource {
    config: SourceConfig,
    clock: Arc<dyn Clock>,
    running: Arc<AtomicBool>,
}

impl MockRecordSource {
    /// 创建新的 Mock 输入源
    pub fn new(config: SourceConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 创建固定方位的 Mock 视觉源
    pub fn vision(id: &str, rate_hz: f64, bearing_deg: f64, confidence: f64, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            SourceConfig {
                id: id.to_string(),
                kind: MockSourceKind::Vision,
                rate_hz,
                bearing_deg,
                drift_deg_s: 0.0,
                confidence,
                fault: None,
            },
            clock,
        )
    }

    /// 创建 Mock 遥测源
    pub fn telemetry(id: &str, rate_hz: f64, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            SourceConfig {
                id: id.to_string(),
                kind: MockSourceKind::Telemetry,
                rate_hz,
                bearing_deg: 0.0,
                drift_deg_s: 0.0,
                confidence: 1.0,
                fault: None,
            },
            clock,
        )
    }
}

fn stream_of(kind: MockSourceKind) -> StreamKind {
    match kind {
        MockSourceKind::Vision => StreamKind::Observation(SourceKind::Vision),
        MockSourceKind::Thermal => StreamKind::Observation(SourceKind::Thermal),
        MockSourceKind::Audio => StreamKind::Observation(SourceKind::Audio),
        MockSourceKind::Telemetry => StreamKind::Telemetry,
    }
}

/// Whether `elapsed_ms` falls inside the configured fault window.
fn in_fault(config: &SourceConfig, elapsed_ms: u64) -> bool {
    config.fault.is_some_and(|fault| {
        elapsed_ms >= fault.after_ms && elapsed_ms < fault.after_ms.saturating_add(fault.duration_ms)
    })
}

/// Build the record a mock source emits at `now`, `started` being its first tick.
pub fn build_record(config: &SourceConfig, started: RecordTime, now: RecordTime) -> InputRecord {
    let elapsed_ms = now.since(&started);
    let faulted = in_fault(config, elapsed_ms);

    match stream_of(config.kind) {
        StreamKind::Observation(source) => {
            let obs = if faulted {
                Observation::new(source, now, None, None, ObservationStatus::NoSignal)
            } else {
                let bearing = config.bearing_deg + config.drift_deg_s * elapsed_ms as f64 / 1000.0;
                Observation::ok(source, now, normalize_bearing(bearing), config.confidence)
            };
            InputRecord::Observation(obs)
        }
        _ => {
            let link = if faulted { LinkStatus::Lost } else { LinkStatus::Ok };
            let mut state = TelemetryState::new(now, link);
            state.attitude = Some(Attitude {
                roll_deg: 0.0,
                pitch_deg: 0.0,
                yaw_deg: 0.0,
            });
            state.battery = Some(Battery {
                voltage_v: (16.8 - elapsed_ms as f64 * 1e-5).max(13.2),
                remaining_pct: None,
            });
            state.position = Some(Position {
                lat: 47.397_742,
                lon: 8.545_594,
                alt_m: 25.0,
            });
            InputRecord::Telemetry(state)
        }
    }
}

impl RecordSource for MockRecordSource {
    fn source_id(&self) -> &str {
        &self.config.id
    }

    fn stream(&self) -> StreamKind {
        stream_of(self.config.kind)
    }

    fn listen(&self, callback: RecordCallback) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let clock = self.clock.clone();
        let running = self.running.clone();

        std::thread::spawn(move || {
            let interval = Duration::from_secs_f64(1.0 / config.rate_hz);
            let started = clock.now();

            debug!(
                source_id = %config.id,
                kind = ?config.kind,
                rate_hz = config.rate_hz,
                "mock record source started"
            );

            while running.load(Ordering::Relaxed) {
                let record = build_record(&config, started, clock.now());
                trace!(source_id = %config.id, mono_ms = record.time().mono_ms, "mock record");
                callback(record);
                std::thread::sleep(interval);
            }

            debug!(source_id = %config.id, "mock record source stopped");
        });
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

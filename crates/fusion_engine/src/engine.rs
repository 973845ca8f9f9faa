//! Main fusion engine implementation.

use std::collections::BTreeSet;

use contracts::{
    angular_distance, FusedObservation, FusionConfig, Observation, ObservationStatus, RecordTime,
    SourceKind,
};
use tracing::{debug, instrument, trace};

use crate::circular::weighted_circular_mean;

/// One source that qualified for this cycle
#[derive(Debug, Clone, Copy)]
struct Contribution {
    source: SourceKind,
    bearing_deg: f64,
    /// Confidence after the DEGRADED penalty
    confidence: f64,
    weight: f64,
    degraded: bool,
}

/// Multi-source bearing fusion
#[derive(Debug)]
pub struct FusionEngine {
    config: FusionConfig,
    /// Completed cycles
    cycles: u64,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self { config, cycles: 0 }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one fusion cycle over the current per-source observations.
    ///
    /// Never fails: missing, stale and invalid inputs yield NO_SIGNAL or INVALID.
    #[instrument(
        level = "trace",
        name = "fusion_cycle",
        skip(self, observations),
        fields(mono_ms = now.mono_ms)
    )]
    pub fn fuse<'a, I>(&mut self, observations: I, now: RecordTime) -> FusedObservation
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        self.cycles += 1;

        let mut fresh = 0usize;
        let mut invalid = 0usize;
        let mut contributions = Vec::with_capacity(SourceKind::OBSERVED.len());

        for obs in observations {
            if obs.source == SourceKind::Fusion {
                continue;
            }
            if now.since(&obs.time) > self.config.stale_after_ms {
                trace!(source = %obs.source, age_ms = now.since(&obs.time), "stale observation ignored");
                continue;
            }
            fresh += 1;
            if obs.status == ObservationStatus::Invalid {
                invalid += 1;
            }
            if let Some(c) = self.qualify(obs) {
                contributions.push(c);
            }
        }

        contributions.sort_by_key(|c| c.source);

        let fused = match contributions.as_slice() {
            [] => {
                let status = if fresh > 0 && invalid == fresh {
                    ObservationStatus::Invalid
                } else {
                    ObservationStatus::NoSignal
                };
                FusedObservation::empty(now, status)
            }
            [single] => {
                let status = if single.degraded {
                    ObservationStatus::Degraded
                } else {
                    ObservationStatus::Ok
                };
                Self::from_single(now, single, status)
            }
            many => self.combine(now, many),
        };

        record_metrics(&fused);
        fused
    }

    /// Turn an observation into a weighted contribution, or `None` if it may not vote.
    fn qualify(&self, obs: &Observation) -> Option<Contribution> {
        let degraded = match obs.status {
            ObservationStatus::Ok => false,
            ObservationStatus::Degraded => true,
            ObservationStatus::Invalid | ObservationStatus::NoSignal => return None,
        };
        let bearing_deg = obs.bearing_deg.filter(|b| b.is_finite())?;

        let mut confidence = obs
            .confidence
            .filter(|c| c.is_finite())
            .unwrap_or(self.config.default_confidence)
            .clamp(0.0, 1.0);
        if degraded {
            confidence *= self.config.degraded_penalty;
        }

        let weight = confidence * self.config.priorities.weight(obs.source);
        if weight <= 0.0 {
            return None;
        }

        Some(Contribution {
            source: obs.source,
            bearing_deg: contracts::normalize_bearing(bearing_deg),
            confidence,
            weight,
            degraded,
        })
    }

    fn from_single(now: RecordTime, c: &Contribution, status: ObservationStatus) -> FusedObservation {
        let mut fused = FusedObservation::empty(now, status);
        fused.bearing_deg = Some(c.bearing_deg);
        fused.confidence = c.confidence;
        fused.contributing_sources = BTreeSet::from([c.source]);
        fused
    }

    fn combine(&self, now: RecordTime, contributions: &[Contribution]) -> FusedObservation {
        let spread = max_pairwise_spread(contributions);

        if spread > self.config.agreement_tolerance_deg {
            let best = strongest(contributions);
            debug!(
                spread_deg = spread,
                tolerance_deg = self.config.agreement_tolerance_deg,
                chosen = %best.source,
                "conflicting bearings, falling back to strongest source"
            );
            metrics::counter!("fusion_conflicts_total").increment(1);
            return Self::from_single(now, best, ObservationStatus::Degraded);
        }

        let Some(mean) =
            weighted_circular_mean(contributions.iter().map(|c| (c.bearing_deg, c.weight)))
        else {
            // Only reachable with a tolerance close to 180°
            return Self::from_single(now, strongest(contributions), ObservationStatus::Degraded);
        };

        let total_weight: f64 = contributions.iter().map(|c| c.weight).sum();
        let confidence = contributions
            .iter()
            .map(|c| c.weight * c.confidence)
            .sum::<f64>()
            / total_weight;

        let mut fused = FusedObservation::empty(now, ObservationStatus::Ok);
        fused.bearing_deg = Some(mean.bearing_deg);
        fused.confidence = confidence.clamp(0.0, 1.0);
        fused.contributing_sources = contributions.iter().map(|c| c.source).collect();
        fused
    }
}

/// Largest angular difference between any two contributions.
fn max_pairwise_spread(contributions: &[Contribution]) -> f64 {
    let mut spread = 0.0_f64;
    for (i, a) in contributions.iter().enumerate() {
        for b in &contributions[i + 1..] {
            spread = spread.max(angular_distance(a.bearing_deg, b.bearing_deg));
        }
    }
    spread
}

/// Highest weight; ties go to the earlier source in priority order.
fn strongest(contributions: &[Contribution]) -> &Contribution {
    let mut best = &contributions[0];
    for c in &contributions[1..] {
        if c.weight > best.weight {
            best = c;
        }
    }
    best
}

fn record_metrics(fused: &FusedObservation) {
    metrics::counter!("fusion_cycles_total", "status" => fused.status.as_str()).increment(1);
    metrics::histogram!("fusion_sources").record(fused.contributing_sources.len() as f64);
    if fused.has_signal() {
        metrics::histogram!("fusion_confidence").record(fused.confidence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> RecordTime {
        RecordTime::new(1_700_000_000_000, 10_000)
    }

    fn obs(source: SourceKind, bearing: Option<f64>, conf: Option<f64>, status: ObservationStatus) -> Observation {
        Observation::new(source, RecordTime::new(1_700_000_000_000, 9_950), bearing, conf, status)
    }

    fn engine() -> FusionEngine {
        FusionEngine::new(FusionConfig::default())
    }

    #[test]
    fn test_single_vision_passes_through() {
        let vision = Observation::ok(SourceKind::Vision, RecordTime::new(0, 9_990), 32.5, 0.78);
        let fused = engine().fuse([&vision], now());
        assert_eq!(fused.bearing_deg, Some(32.5));
        assert_eq!(fused.confidence, 0.78);
        assert_eq!(fused.status, ObservationStatus::Ok);
        assert_eq!(fused.contributing_sources, BTreeSet::from([SourceKind::Vision]));
    }

    #[test]
    fn test_no_observations_is_no_signal() {
        let fused = engine().fuse(std::iter::empty(), now());
        assert!(fused.bearing_deg.is_none());
        assert_eq!(fused.status, ObservationStatus::NoSignal);
        assert_eq!(fused.confidence, 0.0);
    }

    #[test]
    fn test_invalid_never_contributes() {
        let thermal = obs(SourceKind::Thermal, Some(120.0), Some(0.9), ObservationStatus::Invalid);
        let fused = engine().fuse([&thermal], now());
        assert!(fused.bearing_deg.is_none());
        assert_eq!(fused.status, ObservationStatus::Invalid);
    }

    #[test]
    fn test_mixed_non_ok_is_no_signal() {
        let thermal = obs(SourceKind::Thermal, Some(120.0), Some(0.9), ObservationStatus::Invalid);
        let audio = obs(SourceKind::Audio, None, None, ObservationStatus::Ok);
        let vision = obs(SourceKind::Vision, Some(10.0), Some(0.9), ObservationStatus::NoSignal);
        let fused = engine().fuse([&thermal, &audio, &vision], now());
        assert!(fused.bearing_deg.is_none());
        assert_eq!(fused.status, ObservationStatus::NoSignal);
    }

    #[test]
    fn test_stale_observation_ignored() {
        let vision = Observation::ok(SourceKind::Vision, RecordTime::new(0, 9_000), 32.5, 0.78);
        let fused = engine().fuse([&vision], now());
        assert_eq!(fused.status, ObservationStatus::NoSignal);
        assert!(fused.contributing_sources.is_empty());
    }

    #[test]
    fn test_agreeing_sources_wrap_to_zero() {
        let vision = obs(SourceKind::Vision, Some(350.0), Some(0.8), ObservationStatus::Ok);
        let mut engine = FusionEngine::new(FusionConfig {
            priorities: contracts::SourcePriorities {
                vision: 1.0,
                thermal: 1.0,
                audio: 1.0,
            },
            ..FusionConfig::default()
        });
        let thermal = obs(SourceKind::Thermal, Some(10.0), Some(0.8), ObservationStatus::Ok);
        let fused = engine.fuse([&vision, &thermal], now());
        assert_eq!(fused.bearing_deg, Some(0.0));
        assert_eq!(fused.status, ObservationStatus::Ok);
        assert!((fused.confidence - 0.8).abs() < 1e-12);
        assert_eq!(fused.contributing_sources.len(), 2);
    }

    #[test]
    fn test_agreement_confidence_is_weighted_mean() {
        let vision = obs(SourceKind::Vision, Some(30.0), Some(0.9), ObservationStatus::Ok);
        let audio = obs(SourceKind::Audio, Some(36.0), Some(0.5), ObservationStatus::Ok);
        let fused = engine().fuse([&vision, &audio], now());
        // weights: 0.9 * 1.0 = 0.9, 0.5 * 0.6 = 0.3
        let expected = (0.9 * 0.9 + 0.3 * 0.5) / 1.2;
        assert!((fused.confidence - expected).abs() < 1e-12);
        let bearing = fused.bearing_deg.unwrap();
        assert!(bearing > 30.0 && bearing < 33.0, "{bearing}");
    }

    #[test]
    fn test_conflict_prefers_strongest_and_degrades() {
        let vision = obs(SourceKind::Vision, Some(30.0), Some(0.4), ObservationStatus::Ok);
        let thermal = obs(SourceKind::Thermal, Some(200.0), Some(0.9), ObservationStatus::Ok);
        let fused = engine().fuse([&vision, &thermal], now());
        // thermal weight 0.72 beats vision 0.4
        assert_eq!(fused.bearing_deg, Some(200.0));
        assert_eq!(fused.status, ObservationStatus::Degraded);
        assert_eq!(fused.contributing_sources, BTreeSet::from([SourceKind::Thermal]));
    }

    #[test]
    fn test_conflict_tie_goes_to_priority_order() {
        let mut engine = FusionEngine::new(FusionConfig {
            priorities: contracts::SourcePriorities {
                vision: 1.0,
                thermal: 1.0,
                audio: 1.0,
            },
            ..FusionConfig::default()
        });
        let audio = obs(SourceKind::Audio, Some(90.0), Some(0.5), ObservationStatus::Ok);
        let vision = obs(SourceKind::Vision, Some(10.0), Some(0.5), ObservationStatus::Ok);
        let fused = engine.fuse([&audio, &vision], now());
        assert_eq!(fused.contributing_sources, BTreeSet::from([SourceKind::Vision]));
    }

    #[test]
    fn test_degraded_source_penalized() {
        let audio = obs(SourceKind::Audio, Some(45.0), Some(0.8), ObservationStatus::Degraded);
        let fused = engine().fuse([&audio], now());
        assert_eq!(fused.status, ObservationStatus::Degraded);
        assert!((fused.confidence - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_null_confidence_uses_default() {
        let thermal = obs(SourceKind::Thermal, Some(45.0), None, ObservationStatus::Ok);
        let fused = engine().fuse([&thermal], now());
        assert_eq!(fused.confidence, 0.5);
    }

    #[test]
    fn test_cycle_counter() {
        let mut engine = engine();
        engine.fuse(std::iter::empty(), now());
        engine.fuse(std::iter::empty(), now());
        assert_eq!(engine.cycles(), 2);
    }
}

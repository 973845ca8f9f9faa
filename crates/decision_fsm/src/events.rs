//! Per-type event cooldown.

use std::collections::HashMap;

use contracts::{Event, EventType};

/// Suppresses repeats of the same event type within a cooldown window.
///
/// `MODE_CHANGED` and `SHUTDOWN` always pass so every state change stays in
/// the audit trail.
#[derive(Debug, Clone)]
pub struct EventThrottle {
    cooldown_ms: u64,
    last_emitted: HashMap<EventType, u64>,
}

impl EventThrottle {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms,
            last_emitted: HashMap::new(),
        }
    }

    /// Whether `event` should be emitted; records it if so.
    pub fn admit(&mut self, event: &Event) -> bool {
        if matches!(event.event_type, EventType::ModeChanged | EventType::Shutdown) {
            return true;
        }
        let now = event.time.mono_ms;
        match self.last_emitted.get(&event.event_type) {
            Some(&last) if now.saturating_sub(last) < self.cooldown_ms => false,
            _ => {
                self.last_emitted.insert(event.event_type, now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::RecordTime;

    fn event(kind: EventType, mono_ms: u64) -> Event {
        Event::info(RecordTime::new(0, mono_ms), kind, "")
    }

    #[test]
    fn test_repeat_suppressed_within_cooldown() {
        let mut throttle = EventThrottle::new(1000);
        assert!(throttle.admit(&event(EventType::LinkLost, 0)));
        assert!(!throttle.admit(&event(EventType::LinkLost, 999)));
        assert!(throttle.admit(&event(EventType::LinkLost, 1000)));
    }

    #[test]
    fn test_types_independent() {
        let mut throttle = EventThrottle::new(1000);
        assert!(throttle.admit(&event(EventType::LinkLost, 0)));
        assert!(throttle.admit(&event(EventType::TargetLost, 10)));
    }

    #[test]
    fn test_mode_changes_always_pass() {
        let mut throttle = EventThrottle::new(1000);
        assert!(throttle.admit(&event(EventType::ModeChanged, 0)));
        assert!(throttle.admit(&event(EventType::ModeChanged, 1)));
    }
}

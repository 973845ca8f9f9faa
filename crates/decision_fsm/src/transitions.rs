//! Transition table.
//!
//! Every legal state change is one row. There is deliberately no
//! `Degraded -> Locked` row.

use contracts::FsmState;

/// Condition that enables a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// OK fused status with confidence >= scan_conf
    Acquired,
    /// OK fused status with confidence >= lock_conf held for lock_dwell
    LockDwellMet,
    /// No bearing for longer than lost_timeout
    SignalLost,
    /// Any bearing present again
    SignalRecovered,
    /// degraded_cooldown elapsed since entering the state
    CooldownElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: FsmState,
    pub to: FsmState,
    pub guard: Guard,
    pub reason: &'static str,
}

pub const TRANSITIONS: &[Transition] = &[
    Transition {
        from: FsmState::Search,
        to: FsmState::Scan,
        guard: Guard::Acquired,
        reason: "target acquired",
    },
    Transition {
        from: FsmState::Scan,
        to: FsmState::Locked,
        guard: Guard::LockDwellMet,
        reason: "lock confidence sustained",
    },
    Transition {
        from: FsmState::Scan,
        to: FsmState::Degraded,
        guard: Guard::SignalLost,
        reason: "signal lost",
    },
    Transition {
        from: FsmState::Locked,
        to: FsmState::Degraded,
        guard: Guard::SignalLost,
        reason: "signal lost",
    },
    Transition {
        from: FsmState::Degraded,
        to: FsmState::Search,
        guard: Guard::SignalRecovered,
        reason: "signal recovered",
    },
    Transition {
        from: FsmState::Degraded,
        to: FsmState::Search,
        guard: Guard::CooldownElapsed,
        reason: "cooldown elapsed",
    },
];

/// Lower is safer. Used to pick between simultaneously enabled transitions.
pub(crate) fn aggressiveness(state: FsmState) -> u8 {
    match state {
        FsmState::Degraded => 0,
        FsmState::Search => 1,
        FsmState::Scan => 2,
        FsmState::Locked => 3,
    }
}

/// Pick the transition to take from `from`, given which guards hold.
///
/// Ties between enabled rows resolve to the most conservative target, then
/// to table order.
pub(crate) fn select(from: FsmState, holds: impl Fn(Guard) -> bool) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .filter(|t| t.from == from && holds(t.guard))
        .min_by_key(|t| aggressiveness(t.to))
}

//! Rolling one-second rate window.

use std::fmt;

use contracts::{MAX_RATE_LIMIT_HZ, MIN_RATE_LIMIT_HZ};
use ringbuf::{traits::*, HeapRb};

const WINDOW_MS: u64 = 1000;

/// Emission timestamps over the last second.
///
/// A command at `t` occupies the half-open window `(t - 1000, t]`. Two rules
/// apply together: at most `floor(rate_hz)` (minimum 1) entries per window,
/// and at least `ceil(1000 / rate_hz)` ms between consecutive emissions.
pub struct RateWindow {
    stamps: HeapRb<u64>,
    /// Kept apart from `stamps`: spacing can exceed the window at low rates
    last: Option<u64>,
    max_per_window: usize,
    min_spacing_ms: u64,
}

impl fmt::Debug for RateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateWindow")
            .field("len", &self.stamps.occupied_len())
            .field("max_per_window", &self.max_per_window)
            .field("min_spacing_ms", &self.min_spacing_ms)
            .finish()
    }
}

impl RateWindow {
    /// `rate_hz` is clamped to `[MIN_RATE_LIMIT_HZ, MAX_RATE_LIMIT_HZ]`; NaN maps to the minimum.
    pub fn new(rate_hz: f64) -> Self {
        let rate_hz = rate_hz.max(MIN_RATE_LIMIT_HZ).min(MAX_RATE_LIMIT_HZ);
        let max_per_window = (rate_hz.floor() as usize).max(1);
        let min_spacing_ms = (WINDOW_MS as f64 / rate_hz).ceil() as u64;
        Self {
            stamps: HeapRb::new(max_per_window),
            last: None,
            max_per_window,
            min_spacing_ms,
        }
    }

    pub fn min_spacing_ms(&self) -> u64 {
        self.min_spacing_ms
    }

    fn evict(&mut self, now_ms: u64) {
        loop {
            let Some(oldest) = self.stamps.iter().next().copied() else {
                break;
            };
            if now_ms.saturating_sub(oldest) < WINDOW_MS {
                break;
            }
            self.stamps.try_pop();
        }
    }

    /// Whether an emission at `now_ms` would respect both rules.
    pub fn allows(&mut self, now_ms: u64) -> bool {
        self.evict(now_ms);
        now_ms >= self.earliest_slot()
    }

    /// Earliest monotonic ms at which the next emission is allowed.
    pub fn next_slot_at(&mut self, now_ms: u64) -> u64 {
        self.evict(now_ms);
        self.earliest_slot().max(now_ms)
    }

    fn earliest_slot(&self) -> u64 {
        let spacing = self
            .last
            .map_or(0, |last| last.saturating_add(self.min_spacing_ms));
        let window = if self.stamps.is_full() {
            self.stamps
                .iter()
                .next()
                .map_or(0, |&oldest| oldest.saturating_add(WINDOW_MS))
        } else {
            0
        };
        spacing.max(window)
    }

    /// Record an emission. Callers check [`RateWindow::allows`] first.
    pub fn record(&mut self, now_ms: u64) {
        self.evict(now_ms);
        if self.stamps.is_full() {
            self.stamps.try_pop();
        }
        let _ = self.stamps.try_push(now_ms);
        self.last = Some(now_ms);
    }

    /// Emissions in the window ending at `now_ms`.
    pub fn in_window(&mut self, now_ms: u64) -> usize {
        self.evict(now_ms);
        self.stamps.occupied_len()
    }
}

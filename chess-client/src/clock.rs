//! Local countdown between authoritative time updates.
//!
//! The server owns the clocks. [`ClockTracker`] only interpolates between its
//! `timeUpdate` pushes so the display keeps moving, one whole second at a
//! time, for the side on turn. Hitting zero is reported through
//! [`ClockTracker::flag_down`] and nothing else; only a `gameOver` push ends
//! a game.

use std::time::Duration;

use chess::PieceColor;
use tokio::time::Instant;

/// Granularity of local ticks.
pub const TICK_UNIT_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSnapshot {
    pub white_ms: u64,
    pub black_ms: u64,
    /// Local time at which these values were last set or ticked.
    pub captured_at: Instant,
}

#[derive(Debug, Clone)]
pub struct ClockTracker {
    white_ms: u64,
    black_ms: u64,
    captured_at: Instant,
    /// Anchor for whole-unit ticks; moves forward by whole units only.
    last_tick: Instant,
    turn: Option<PieceColor>,
    frozen: bool,
    paused: bool,
}

impl ClockTracker {
    pub fn new(initial_ms: u64, now: Instant) -> Self {
        Self {
            white_ms: initial_ms,
            black_ms: initial_ms,
            captured_at: now,
            last_tick: now,
            turn: None,
            frozen: false,
            paused: false,
        }
    }

    /// Replace both clocks with server values and re-anchor local ticking.
    ///
    /// Ignored once the clock is frozen by a terminal session.
    pub fn on_authoritative_update(&mut self, white_ms: u64, black_ms: u64, now: Instant) {
        if self.frozen {
            return;
        }
        self.white_ms = white_ms;
        self.black_ms = black_ms;
        self.captured_at = now;
        self.last_tick = now;
    }

    /// Deduct the whole units elapsed since the last anchor from the side on
    /// turn. Returns whether any value changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(side) = self.turn else {
            self.last_tick = now;
            return false;
        };
        if self.frozen || self.paused {
            self.last_tick = now;
            return false;
        }

        let elapsed = now.saturating_duration_since(self.last_tick).as_millis() as u64;
        let units = elapsed / TICK_UNIT_MS;
        if units == 0 {
            return false;
        }
        self.last_tick += Duration::from_millis(units * TICK_UNIT_MS);
        self.captured_at = now;

        let slot = match side {
            PieceColor::White => &mut self.white_ms,
            PieceColor::Black => &mut self.black_ms,
        };
        let before = *slot;
        *slot = slot.saturating_sub(units * TICK_UNIT_MS);
        before != *slot
    }

    /// Start over for a new session: both sides at `initial_ms`, running
    /// once a side is put on turn.
    pub fn reset(&mut self, initial_ms: u64, now: Instant) {
        self.restart(initial_ms, initial_ms, now);
    }

    pub fn restart(&mut self, white_ms: u64, black_ms: u64, now: Instant) {
        self.white_ms = white_ms;
        self.black_ms = black_ms;
        self.captured_at = now;
        self.last_tick = now;
        self.turn = None;
        self.frozen = false;
        self.paused = false;
    }

    /// Switch the running side. Time already accrued is charged to the side
    /// that was on turn.
    pub fn set_turn(&mut self, side: PieceColor, now: Instant) {
        if self.turn != Some(side) {
            self.tick(now);
            self.last_tick = now;
        }
        self.turn = Some(side);
    }

    /// Stop for good; only [`ClockTracker::reset`] or
    /// [`ClockTracker::restart`] thaws a frozen clock.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn pause(&mut self, now: Instant) {
        self.tick(now);
        self.paused = true;
    }

    pub fn resume(&mut self, now: Instant) {
        if self.paused {
            self.paused = false;
            self.last_tick = now;
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn turn(&self) -> Option<PieceColor> {
        self.turn
    }

    pub fn remaining(&self, side: PieceColor) -> Duration {
        Duration::from_millis(match side {
            PieceColor::White => self.white_ms,
            PieceColor::Black => self.black_ms,
        })
    }

    /// Whether a side shows zero locally. Informational only.
    pub fn flag_down(&self, side: PieceColor) -> bool {
        self.remaining(side).is_zero()
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            white_ms: self.white_ms,
            black_ms: self.black_ms,
            captured_at: self.captured_at,
        }
    }

    /// Format a duration for display. MM:SS or M:SS.s when under 10 seconds.
    pub fn format_time(duration: Duration) -> String {
        let total_secs = duration.as_secs();
        let minutes = total_secs / 60;
        let seconds = total_secs % 60;

        if total_secs < 10 {
            let tenths = duration.subsec_millis() / 100;
            format!("{}:{:02}.{}", minutes, seconds, tenths)
        } else {
            format!("{}:{:02}", minutes, seconds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(initial_ms: u64, side: PieceColor) -> (ClockTracker, Instant) {
        let now = Instant::now();
        let mut clock = ClockTracker::new(initial_ms, now);
        clock.set_turn(side, now);
        (clock, now)
    }

    #[test]
    fn test_tick_reduces_side_on_turn_only() {
        let (mut clock, t0) = running(180_000, PieceColor::White);
        assert!(clock.tick(t0 + Duration::from_secs(1)));
        assert_eq!(clock.remaining(PieceColor::White), Duration::from_secs(179));
        assert_eq!(clock.remaining(PieceColor::Black), Duration::from_secs(180));
    }

    #[test]
    fn test_tick_is_whole_units() {
        let (mut clock, t0) = running(10_000, PieceColor::Black);
        assert!(!clock.tick(t0 + Duration::from_millis(999)));
        assert_eq!(clock.snapshot().black_ms, 10_000);
        assert!(clock.tick(t0 + Duration::from_millis(2_500)));
        assert_eq!(clock.snapshot().black_ms, 8_000);
        // The leftover 500ms carries over to the next unit.
        assert!(clock.tick(t0 + Duration::from_millis(3_000)));
        assert_eq!(clock.snapshot().black_ms, 7_000);
    }

    #[test]
    fn test_tick_in_same_unit_as_authoritative_update_is_noop() {
        let (mut clock, t0) = running(60_000, PieceColor::White);
        let update_at = t0 + Duration::from_millis(4_300);
        clock.on_authoritative_update(55_000, 60_000, update_at);
        assert!(!clock.tick(t0 + Duration::from_millis(5_000)));
        assert_eq!(clock.snapshot().white_ms, 55_000);
        assert!(clock.tick(update_at + Duration::from_secs(1)));
        assert_eq!(clock.snapshot().white_ms, 54_000);
    }

    #[test]
    fn test_never_below_zero() {
        let (mut clock, t0) = running(3_000, PieceColor::Black);
        clock.tick(t0 + Duration::from_secs(10));
        assert_eq!(clock.remaining(PieceColor::Black), Duration::ZERO);
        assert!(clock.flag_down(PieceColor::Black));
        assert!(!clock.flag_down(PieceColor::White));
        assert!(!clock.tick(t0 + Duration::from_secs(20)));
    }

    #[test]
    fn test_frozen_clock_ignores_ticks_and_updates() {
        let (mut clock, t0) = running(30_000, PieceColor::White);
        clock.freeze();
        assert!(!clock.tick(t0 + Duration::from_secs(5)));
        clock.on_authoritative_update(1, 1, t0 + Duration::from_secs(6));
        assert_eq!(clock.snapshot().white_ms, 30_000);
        clock.reset(60_000, t0 + Duration::from_secs(7));
        assert!(!clock.is_frozen());
        assert_eq!(clock.turn(), None);
        assert_eq!(clock.snapshot().black_ms, 60_000);
    }

    #[test]
    fn test_pause_and_resume() {
        let (mut clock, t0) = running(30_000, PieceColor::White);
        clock.pause(t0);
        assert!(!clock.tick(t0 + Duration::from_secs(10)));
        clock.resume(t0 + Duration::from_secs(10));
        assert!(clock.tick(t0 + Duration::from_secs(11)));
        assert_eq!(clock.snapshot().white_ms, 29_000);
    }

    #[test]
    fn test_set_turn_charges_previous_side() {
        let (mut clock, t0) = running(30_000, PieceColor::White);
        clock.set_turn(PieceColor::Black, t0 + Duration::from_millis(2_200));
        assert_eq!(clock.snapshot().white_ms, 28_000);
        clock.tick(t0 + Duration::from_millis(3_200));
        assert_eq!(clock.snapshot().black_ms, 29_000);
        assert_eq!(clock.snapshot().white_ms, 28_000);
    }

    #[test]
    fn test_no_turn_no_tick() {
        let t0 = Instant::now();
        let mut clock = ClockTracker::new(5_000, t0);
        assert!(!clock.tick(t0 + Duration::from_secs(3)));
        assert_eq!(clock.remaining(PieceColor::White), Duration::from_secs(5));
    }

    #[test]
    fn test_format_time() {
        assert_eq!(ClockTracker::format_time(Duration::from_secs(180)), "3:00");
        assert_eq!(ClockTracker::format_time(Duration::from_secs(65)), "1:05");
        assert_eq!(
            ClockTracker::format_time(Duration::from_millis(5300)),
            "0:05.3"
        );
    }
}

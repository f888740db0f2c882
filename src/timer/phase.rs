// TimerPhase - deterministic phase computation
//
// All timestamps are epoch milliseconds in the authoritative clock domain;
// callers pass an adjusted "now" (see `clock::AdjustedClock`).

use serde::{Deserialize, Serialize};

/// Displayed phase of a round. Derived on every tick, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    Idle,
    Prep,
    Climb,
    Stopped,
}

/// Output of one phase evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub phase: TimerPhase,
    /// Milliseconds left in the whole round (prep + climb), never negative
    pub remaining_ms: i64,
}

impl TimerState {
    pub const fn new(phase: TimerPhase, remaining_ms: i64) -> Self {
        Self {
            phase,
            remaining_ms,
        }
    }

    /// The scheduling loop keeps ticking only while this holds.
    pub fn is_live(&self) -> bool {
        self.phase != TimerPhase::Stopped && self.remaining_ms > 0
    }
}

/// The inputs of the phase function, extracted from a round descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSchedule {
    pub start_time_ms: i64,
    pub climbing_duration_ms: u64,
    pub preparation_duration_ms: u64,
    pub preparation_enabled: bool,
    pub stopped: bool,
}

impl RoundSchedule {
    /// Length of the round, including preparation when enabled.
    ///
    /// Saturates instead of overflowing, so an oversized descriptor from a
    /// remote store reads as a very long round.
    pub fn total_ms(&self) -> i64 {
        let climb = duration_ms(self.climbing_duration_ms);
        if self.preparation_enabled {
            duration_ms(self.preparation_duration_ms).saturating_add(climb)
        } else {
            climb
        }
    }

    /// Instant at which the round expires naturally.
    pub fn end_time_ms(&self) -> i64 {
        self.start_time_ms.saturating_add(self.total_ms())
    }
}

fn duration_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// Compute phase and remaining time for `schedule` at `now_ms`.
///
/// Rules, in order:
/// 1. a stopped round is `Stopped` with nothing remaining, whatever the time
/// 2. before the scheduled instant the round is `Idle` showing the full
///    duration (the pre-start lead window)
/// 3. at or after `start + total` the round is `Idle` with nothing remaining,
///    no RESET needed
/// 4. inside the preparation window the round is `Prep`
/// 5. otherwise `Climb`
///
/// Remaining time counts down over the whole round, so during `Prep` it
/// includes the climbing duration.
pub fn compute_timer_state(schedule: &RoundSchedule, now_ms: i64) -> TimerState {
    if schedule.stopped {
        return TimerState::new(TimerPhase::Stopped, 0);
    }

    let total_ms = schedule.total_ms();
    let elapsed = now_ms.saturating_sub(schedule.start_time_ms);

    if elapsed < 0 {
        return TimerState::new(TimerPhase::Idle, total_ms);
    }

    if elapsed >= total_ms {
        return TimerState::new(TimerPhase::Idle, 0);
    }

    if schedule.preparation_enabled && elapsed < duration_ms(schedule.preparation_duration_ms) {
        return TimerState::new(TimerPhase::Prep, total_ms - elapsed);
    }

    TimerState::new(TimerPhase::Climb, total_ms - elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000_000;

    fn schedule(prep_enabled: bool, stopped: bool) -> RoundSchedule {
        RoundSchedule {
            start_time_ms: T,
            climbing_duration_ms: 300_000,
            preparation_duration_ms: 60_000,
            preparation_enabled: prep_enabled,
            stopped,
        }
    }

    #[test]
    fn test_before_start_shows_full_duration() {
        let with_prep = schedule(true, false);
        assert_eq!(
            compute_timer_state(&with_prep, T - 2_500),
            TimerState::new(TimerPhase::Idle, 360_000)
        );

        let without_prep = schedule(false, false);
        assert_eq!(
            compute_timer_state(&without_prep, T - 1),
            TimerState::new(TimerPhase::Idle, 300_000)
        );
    }

    #[test]
    fn test_stopped_wins_regardless_of_time() {
        let s = schedule(true, true);
        for now in [T - 10_000, T, T + 30_000, T + 200_000, T + 10_000_000] {
            assert_eq!(
                compute_timer_state(&s, now),
                TimerState::new(TimerPhase::Stopped, 0)
            );
        }
    }

    #[test]
    fn test_prep_to_climb_boundary() {
        let s = schedule(true, false);

        let state = compute_timer_state(&s, T + 59_999);
        assert_eq!(state.phase, TimerPhase::Prep);
        assert_eq!(state.remaining_ms, 300_001);

        let state = compute_timer_state(&s, T + 60_000);
        assert_eq!(state.phase, TimerPhase::Climb);
        assert_eq!(state.remaining_ms, 300_000);
    }

    #[test]
    fn test_prep_disabled_goes_straight_to_climb() {
        let s = schedule(false, false);
        assert_eq!(
            compute_timer_state(&s, T),
            TimerState::new(TimerPhase::Climb, 300_000)
        );
    }

    #[test]
    fn test_expiry_reverts_to_idle() {
        let s = schedule(true, false);
        assert_eq!(
            compute_timer_state(&s, T + 359_999),
            TimerState::new(TimerPhase::Climb, 1)
        );
        assert_eq!(
            compute_timer_state(&s, T + 360_000),
            TimerState::new(TimerPhase::Idle, 0)
        );
    }

    #[test]
    fn test_late_joiner_infers_idle() {
        let s = schedule(true, false);
        let now = s.end_time_ms() + 5_000;
        assert_eq!(
            compute_timer_state(&s, now),
            TimerState::new(TimerPhase::Idle, 0)
        );
    }

    #[test]
    fn test_remaining_is_monotonic() {
        let s = schedule(true, false);
        let mut previous = i64::MAX;
        let mut now = T - 5_000;
        while now < T + 370_000 {
            let state = compute_timer_state(&s, now);
            if now >= T {
                assert!(
                    state.remaining_ms <= previous,
                    "remaining increased at now={} ({} > {})",
                    now,
                    state.remaining_ms,
                    previous
                );
                previous = state.remaining_ms;
            }
            if state.remaining_ms == 0 {
                assert_eq!(state.phase, TimerPhase::Idle);
            }
            now += 733;
        }
    }

    #[test]
    fn test_oversized_durations_saturate() {
        let huge = RoundSchedule {
            start_time_ms: T,
            climbing_duration_ms: u64::MAX,
            preparation_duration_ms: 0,
            preparation_enabled: false,
            stopped: false,
        };
        assert_eq!(huge.total_ms(), i64::MAX);
        assert_eq!(huge.end_time_ms(), i64::MAX);
        assert_eq!(
            compute_timer_state(&huge, T + 10),
            TimerState::new(TimerPhase::Climb, i64::MAX - 10)
        );

        let overflowing = RoundSchedule {
            climbing_duration_ms: i64::MAX as u64,
            preparation_duration_ms: 1,
            preparation_enabled: true,
            ..huge
        };
        assert_eq!(overflowing.total_ms(), i64::MAX);
        assert_eq!(
            compute_timer_state(&overflowing, T + 10),
            TimerState::new(TimerPhase::Climb, i64::MAX - 10)
        );
        assert_eq!(
            compute_timer_state(&overflowing, i64::MIN),
            TimerState::new(TimerPhase::Idle, i64::MAX)
        );
    }

    #[test]
    fn test_is_live() {
        assert!(TimerState::new(TimerPhase::Idle, 360_000).is_live());
        assert!(TimerState::new(TimerPhase::Climb, 1).is_live());
        assert!(!TimerState::new(TimerPhase::Idle, 0).is_live());
        assert!(!TimerState::new(TimerPhase::Stopped, 0).is_live());
    }
}

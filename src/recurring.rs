//! Automatic restart of recurring rounds.
//!
//! When a round with `recurring` set runs out naturally, the next identical
//! round is started with one START. Several ticks can observe the same
//! climb-to-idle edge (clock jitter, a backward step, a re-delivered
//! snapshot), so the decision is a check-and-set on a per-round guard: the
//! first observer claims the restart, everyone after it sees the guard set.

use chrono::{DateTime, Utc};
use log::info;

use crate::control::RoundStarter;
use crate::error::{log_control_error, ControlError};
use crate::round::{RoundConfig, RoundDescriptor};
use crate::telemetry::{self, ControlAction};
use crate::timer::{TimerPhase, TimerState};

/// Restart decision state for one room.
#[derive(Debug, Default)]
pub struct RecurringController {
    round_start_ms: Option<i64>,
    previous_phase: Option<TimerPhase>,
    restart_claimed: bool,
}

impl RecurringController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the restart for the current round was already claimed.
    pub fn restart_claimed(&self) -> bool {
        self.restart_claimed
    }

    /// Feed one tick. Returns `true` exactly once per round: on the first
    /// observed natural climb-to-idle edge of a recurring, unstopped round.
    ///
    /// A new start time re-arms the guard.
    pub fn observe(
        &mut self,
        start_time_ms: i64,
        state: TimerState,
        stopped: bool,
        recurring: bool,
    ) -> bool {
        if self.round_start_ms != Some(start_time_ms) {
            self.round_start_ms = Some(start_time_ms);
            self.previous_phase = None;
            self.restart_claimed = false;
        }

        let previous = self.previous_phase.replace(state.phase);
        let ended_naturally = previous == Some(TimerPhase::Climb)
            && state.phase == TimerPhase::Idle
            && !stopped;

        if ended_naturally && recurring && !self.restart_claimed {
            self.restart_claimed = true;
            return true;
        }
        false
    }

    /// Observe a tick for `descriptor` and, if this tick claims the restart,
    /// issue the START through `starter` with the finished round's settings.
    ///
    /// Returns the new round's start time when a restart was issued.
    pub async fn observe_and_restart<R: RoundStarter>(
        &mut self,
        room_id: &str,
        descriptor: &RoundDescriptor,
        state: TimerState,
        starter: &R,
    ) -> Option<Result<DateTime<Utc>, ControlError>> {
        if !self.observe(
            descriptor.start_time_ms(),
            state,
            descriptor.stopped,
            descriptor.recurring,
        ) {
            return None;
        }

        Some(issue_restart(starter, room_id, &descriptor.config()).await)
    }
}

/// Send the START for a claimed restart and record the outcome.
///
/// Failures are logged and returned but never retried; the guard that
/// claimed the restart stays set.
pub async fn issue_restart<R: RoundStarter>(
    starter: &R,
    room_id: &str,
    config: &RoundConfig,
) -> Result<DateTime<Utc>, ControlError> {
    let result = starter.start_round(room_id, config).await;
    match &result {
        Ok(start) => {
            info!(
                "[Recurring] room={} restarted, next round at {}",
                room_id, start
            );
            telemetry::hub().record_control(ControlAction::Restart, room_id, start.timestamp_millis());
        }
        Err(err) => log_control_error(err, "recurring restart"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const START: i64 = 1_000_000;

    fn climb(remaining_ms: i64) -> TimerState {
        TimerState::new(TimerPhase::Climb, remaining_ms)
    }

    fn idle() -> TimerState {
        TimerState::new(TimerPhase::Idle, 0)
    }

    #[derive(Default)]
    struct CountingStarter {
        calls: AtomicUsize,
    }

    impl RoundStarter for CountingStarter {
        async fn start_round(
            &self,
            _room_id: &str,
            _config: &RoundConfig,
        ) -> Result<DateTime<Utc>, ControlError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(DateTime::<Utc>::default())
        }
    }

    #[test]
    fn natural_end_of_recurring_round_restarts() {
        let mut controller = RecurringController::new();
        assert!(!controller.observe(START, climb(500), false, true));
        assert!(controller.observe(START, idle(), false, true));
        assert!(controller.restart_claimed());
    }

    #[test]
    fn repeated_edge_restarts_once() {
        let mut controller = RecurringController::new();
        let ticks = [climb(500), idle(), climb(100), idle(), idle()];
        let restarts = ticks
            .iter()
            .filter(|state| controller.observe(START, **state, false, true))
            .count();
        assert_eq!(restarts, 1);
    }

    #[test]
    fn stop_or_non_recurring_never_restarts() {
        let mut controller = RecurringController::new();
        controller.observe(START, climb(500), false, false);
        assert!(!controller.observe(START, idle(), false, false));

        let mut controller = RecurringController::new();
        controller.observe(START, climb(500), false, true);
        assert!(!controller.observe(START, TimerState::new(TimerPhase::Stopped, 0), true, true));
    }

    #[test]
    fn late_joiner_after_expiry_does_not_restart() {
        let mut controller = RecurringController::new();
        assert!(!controller.observe(START, idle(), false, true));
        assert!(!controller.observe(START, idle(), false, true));
    }

    #[test]
    fn next_round_rearms_guard() {
        let mut controller = RecurringController::new();
        controller.observe(START, climb(500), false, true);
        assert!(controller.observe(START, idle(), false, true));

        let next = START + 250_000;
        controller.observe(next, climb(500), false, true);
        assert!(controller.observe(next, idle(), false, true));
    }

    struct FailingStarter;

    impl RoundStarter for FailingStarter {
        async fn start_round(
            &self,
            _room_id: &str,
            _config: &RoundConfig,
        ) -> Result<DateTime<Utc>, ControlError> {
            Err(ControlError::Unauthorized)
        }
    }

    #[tokio::test]
    async fn failed_restart_is_reported_and_guard_stays_set() {
        let descriptor = RoundDescriptor::scheduled(
            START,
            &RoundConfig {
                climbing_duration_ms: 1_000,
                preparation_duration_ms: 0,
                preparation_enabled: false,
                recurring: true,
            },
            START,
        );

        let mut controller = RecurringController::new();
        assert!(controller
            .observe_and_restart("ROOM01", &descriptor, climb(200), &FailingStarter)
            .await
            .is_none());
        assert_eq!(
            controller
                .observe_and_restart("ROOM01", &descriptor, idle(), &FailingStarter)
                .await,
            Some(Err(ControlError::Unauthorized))
        );
        assert!(controller.restart_claimed());
        assert!(controller
            .observe_and_restart("ROOM01", &descriptor, idle(), &FailingStarter)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn observe_and_restart_issues_single_start() {
        let starter = CountingStarter::default();
        let descriptor = RoundDescriptor::scheduled(
            START,
            &RoundConfig {
                climbing_duration_ms: 1_000,
                preparation_duration_ms: 0,
                preparation_enabled: false,
                recurring: true,
            },
            START,
        );

        let mut controller = RecurringController::new();
        for state in [climb(200), idle(), idle(), climb(10), idle()] {
            let _ = controller
                .observe_and_restart("ROOM01", &descriptor, state, &starter)
                .await;
        }
        assert_eq!(starter.calls.load(Ordering::SeqCst), 1);
    }
}

// CueEngine - exactly-once cue detection per round
//
// There is no event log to consult: a display may join mid-round, miss ticks
// or see its clock step backwards. Every cue is therefore derived from the
// pair (previous tick, current tick) and guarded by a per-round flag, and all
// flags live in one `CueEngineState` that is replaced wholesale when a new
// round (new start time) shows up.

use super::Cue;
use crate::timer::{ceil_seconds, TimerPhase, TimerState};

const ONE_MINUTE_MS: i64 = 60_000;
const FIVE_SECONDS_MS: i64 = 5_000;
const COUNTDOWN_SECONDS: i64 = 10;

/// Per-round cue state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueEngineState {
    /// Start time of the round these flags belong to
    pub round_start_ms: Option<i64>,
    pub previous: Option<TimerState>,
    pub round_start_fired: bool,
    pub one_minute_fired: bool,
    pub five_second_fired: bool,
    /// Lowest countdown second already beeped; the train only moves down
    pub last_second_fired: Option<u8>,
    pub round_end_fired: bool,
}

impl CueEngineState {
    pub fn for_round(start_time_ms: i64) -> Self {
        Self {
            round_start_ms: Some(start_time_ms),
            ..Self::default()
        }
    }
}

/// Stateful cue detector driven once per scheduling tick.
#[derive(Debug, Default)]
pub struct CueEngine {
    state: CueEngineState,
    muted: bool,
}

impl CueEngine {
    pub fn new(muted: bool) -> Self {
        Self {
            state: CueEngineState::default(),
            muted,
        }
    }

    pub fn state(&self) -> &CueEngineState {
        &self.state
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Muting drops cues instead of queueing them; unmuting never replays.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Forget the current round, e.g. after the room was reset.
    pub fn clear(&mut self) {
        self.state = CueEngineState::default();
    }

    /// Feed one tick and collect the cues to play now.
    ///
    /// Flags advance even while muted, so the returned list is empty but the
    /// cues count as fired.
    pub fn observe(&mut self, start_time_ms: i64, current: TimerState, stopped: bool) -> Vec<Cue> {
        if self.state.round_start_ms != Some(start_time_ms) {
            self.state = CueEngineState::for_round(start_time_ms);
        }

        let fired = detect(&mut self.state, current, stopped);
        self.state.previous = Some(current);

        if self.muted {
            Vec::new()
        } else {
            fired
        }
    }
}

fn detect(state: &mut CueEngineState, current: TimerState, stopped: bool) -> Vec<Cue> {
    let mut cues = Vec::new();
    let previous = state.previous;
    let climbing = current.phase == TimerPhase::Climb;

    if let Some(prev) = previous {
        if !state.round_start_fired
            && prev.phase == TimerPhase::Prep
            && current.phase == TimerPhase::Climb
        {
            state.round_start_fired = true;
            cues.push(Cue::RoundStart);
        }

        if climbing
            && !state.one_minute_fired
            && crossed_down(prev.remaining_ms, current.remaining_ms, ONE_MINUTE_MS)
        {
            state.one_minute_fired = true;
            cues.push(Cue::OneMinuteWarning);
        }

        if climbing
            && !state.five_second_fired
            && crossed_down(prev.remaining_ms, current.remaining_ms, FIVE_SECONDS_MS)
        {
            state.five_second_fired = true;
            cues.push(Cue::FiveSecondWarning);
        }
    }

    if climbing {
        let seconds_left = ceil_seconds(current.remaining_ms);
        if (1..=COUNTDOWN_SECONDS).contains(&seconds_left) {
            let secs = seconds_left as u8;
            if state.last_second_fired.map_or(true, |last| secs < last) {
                state.last_second_fired = Some(secs);
                cues.push(Cue::LastSeconds(secs));
            }
        }
    }

    if let Some(prev) = previous {
        if !state.round_end_fired
            && !stopped
            && prev.phase == TimerPhase::Climb
            && current.phase == TimerPhase::Idle
        {
            state.round_end_fired = true;
            cues.push(Cue::RoundEnd);
        }
    }

    cues
}

fn crossed_down(previous_ms: i64, current_ms: i64, threshold_ms: i64) -> bool {
    previous_ms > threshold_ms && threshold_ms >= current_ms
}

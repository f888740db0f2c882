// Timer module - phase computation and countdown formatting
//
// This module provides two main components:
// 1. compute_timer_state: maps a round schedule plus "now" to a phase and
//    remaining time. Pure, so every display derives the same answer from the
//    same descriptor without talking to its peers.
// 2. format helpers: M:SS countdown text and phase labels for renderers.

pub mod format;
pub mod phase;

pub use format::{
    ceil_seconds, format_hms, format_remaining, hms_to_seconds, parse_hms, phase_label, seconds_to_hms,
    NO_ROUND_TEXT,
};
pub use phase::{compute_timer_state, RoundSchedule, TimerPhase, TimerState};

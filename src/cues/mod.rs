//! Audible cues for the round countdown.
//!
//! The cue engine is an edge detector over the stream of timer states a
//! display computes on each tick. It decides *when* and *which* cue fires;
//! how a cue sounds lives in [`tones`] and the output device sits behind the
//! [`CueSink`] trait.

pub mod engine;
pub mod tones;

pub use engine::{CueEngine, CueEngineState};
pub use tones::{render_cue, tone_plan, write_cue_wav, Tone, Waveform};

use serde::{Deserialize, Serialize};

/// One-shot signal tied to a phase transition or time threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    /// Preparation ended, climbing begins
    RoundStart,
    /// Climb remaining crossed 60 seconds
    OneMinuteWarning,
    /// Climb remaining crossed 5 seconds
    FiveSecondWarning,
    /// Per-second beep for the last ten seconds (value is seconds left)
    LastSeconds(u8),
    /// Climb ran out naturally
    RoundEnd,
}

impl Cue {
    /// Every distinct cue, for rendering and listing.
    pub fn all() -> Vec<Cue> {
        let mut cues = vec![
            Cue::RoundStart,
            Cue::OneMinuteWarning,
            Cue::FiveSecondWarning,
        ];
        cues.extend((1..=10).rev().map(Cue::LastSeconds));
        cues.push(Cue::RoundEnd);
        cues
    }

    /// File-friendly name, e.g. `last_seconds_3`.
    pub fn slug(&self) -> String {
        match self {
            Cue::RoundStart => "round_start".to_string(),
            Cue::OneMinuteWarning => "one_minute_warning".to_string(),
            Cue::FiveSecondWarning => "five_second_warning".to_string(),
            Cue::LastSeconds(secs) => format!("last_seconds_{}", secs),
            Cue::RoundEnd => "round_end".to_string(),
        }
    }
}

/// Output device for cues.
pub trait CueSink: Send {
    fn play(&mut self, cue: Cue);
}

/// Sink that only logs, for headless displays.
#[derive(Debug, Default)]
pub struct LogCueSink {
    played: usize,
}

impl LogCueSink {
    pub fn played(&self) -> usize {
        self.played
    }
}

impl CueSink for LogCueSink {
    fn play(&mut self, cue: Cue) {
        self.played += 1;
        log::info!("[Cue] {}", cue.slug());
    }
}

/// Sink recording cues in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingCueSink {
    pub cues: Vec<Cue>,
}

impl CueSink for RecordingCueSink {
    fn play(&mut self, cue: Cue) {
        self.cues.push(cue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_cues_are_distinct() {
        let cues = Cue::all();
        assert_eq!(cues.len(), 14);
        let slugs: std::collections::HashSet<String> = cues.iter().map(Cue::slug).collect();
        assert_eq!(slugs.len(), cues.len());
    }

    #[test]
    fn test_cue_serialization() {
        assert_eq!(
            serde_json::to_value(Cue::RoundEnd).unwrap(),
            serde_json::json!("round_end")
        );
        assert_eq!(
            serde_json::to_value(Cue::LastSeconds(3)).unwrap(),
            serde_json::json!({ "last_seconds": 3 })
        );
    }
}

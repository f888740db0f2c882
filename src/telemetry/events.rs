//! Core telemetry event types exposed through the `/metrics` endpoint and
//! the CLI.

use serde::{Deserialize, Serialize};

use crate::cues::Cue;

/// Operator actions applied to the round store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Start,
    Stop,
    Reset,
    Restart,
}

/// Diagnostic error codes surfaced via telemetry metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticError {
    Calibration,
    StoreFeed,
    Control,
    Descriptor,
}

/// Metric events covering calibration, control, cues and failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    Calibration {
        offset_ms: i64,
        round_trip_ms: i64,
    },
    RoundTrip {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    Control {
        action: ControlAction,
        room_id: String,
        timestamp_ms: i64,
    },
    CueFired {
        cue: Cue,
    },
    Error {
        code: DiagnosticError,
        context: String,
    },
}

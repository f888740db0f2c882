//! Display sessions: turning a room's descriptor into frames and cues.
//!
//! A [`DisplaySession`] is pure state: it consumes store events and ticks at
//! an adjusted "now", and hands back what to draw and which cues to play.
//! The async loop that drives it lives in [`runner`].

pub mod runner;

pub use runner::{run_display, DisplayLoop};

use serde::Serialize;

use crate::cues::{Cue, CueEngine};
use crate::error::{log_config_error, log_store_error, ConfigError, ErrorCode};
use crate::recurring::RecurringController;
use crate::round::{RoundConfig, RoundDescriptor};
use crate::store::StoreEvent;
use crate::telemetry::{self, DiagnosticError};
use crate::timer::{
    compute_timer_state, format_remaining, phase_label, TimerPhase, TimerState, NO_ROUND_TEXT,
};

/// Label shown instead of a phase while the descriptor is unusable.
pub const FAULT_LABEL: &str = "CONFIG ERROR";

/// Store connectivity as shown in the corner indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Offline,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Reconnecting => "Reconnecting...",
            ConnectionState::Offline => "Offline",
        }
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayFrame {
    pub phase: TimerPhase,
    pub remaining_ms: i64,
    pub text: String,
    pub label: &'static str,
    pub connection: ConnectionState,
    /// Set while the room's descriptor cannot be decoded
    pub fault: Option<String>,
}

impl DisplayFrame {
    /// One-line rendering for terminal displays.
    pub fn status_line(&self, room_id: &str) -> String {
        let label = if self.label.is_empty() { "-" } else { self.label };
        match &self.fault {
            Some(fault) => format!(
                "[{}] {} {} ({}) {}",
                room_id,
                label,
                self.text,
                self.connection.label(),
                fault
            ),
            None => format!(
                "[{}] {} {} ({})",
                room_id,
                label,
                self.text,
                self.connection.label()
            ),
        }
    }
}

/// Result of one scheduling tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub frame: DisplayFrame,
    /// Cues to play now; empty while muted
    pub cues: Vec<Cue>,
    /// Set on the one tick that claims a recurring restart
    pub restart: Option<RoundConfig>,
}

/// Per-room display state.
pub struct DisplaySession {
    room_id: String,
    connection: ConnectionState,
    descriptor: Option<RoundDescriptor>,
    fault: Option<ConfigError>,
    last_state: Option<TimerState>,
    cues: CueEngine,
    recurring: Option<RecurringController>,
}

impl DisplaySession {
    /// `controller` makes this display responsible for recurring restarts.
    pub fn new(room_id: impl Into<String>, muted: bool, controller: bool) -> Self {
        Self {
            room_id: room_id.into(),
            connection: ConnectionState::Connecting,
            descriptor: None,
            fault: None,
            last_state: None,
            cues: CueEngine::new(muted),
            recurring: controller.then(RecurringController::new),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn descriptor(&self) -> Option<&RoundDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn fault(&self) -> Option<&ConfigError> {
        self.fault.as_ref()
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.cues.set_muted(muted);
    }

    /// Whether the scheduling loop should keep ticking.
    ///
    /// A fresh descriptor is live until its first tick says otherwise.
    pub fn is_live(&self) -> bool {
        if self.fault.is_some() || self.descriptor.is_none() {
            return false;
        }
        self.last_state.map_or(true, |state| state.is_live())
    }

    /// Apply one store event.
    ///
    /// Errors only move the connection indicator; the last good descriptor
    /// stays on screen and keeps counting down.
    pub fn apply_event(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::Snapshot(descriptor) => {
                self.connection = ConnectionState::Connected;
                self.fault = None;
                if descriptor.is_none() {
                    self.cues.clear();
                }
                if descriptor.as_ref().map(RoundDescriptor::start_time_ms)
                    != self.descriptor.as_ref().map(RoundDescriptor::start_time_ms)
                {
                    self.last_state = None;
                }
                self.descriptor = descriptor;
            }
            StoreEvent::Malformed(err) => {
                self.connection = ConnectionState::Connected;
                log_config_error(&err, &format!("display room {}", self.room_id));
                telemetry::hub().record_error(DiagnosticError::Descriptor, err.message());
                self.descriptor = None;
                self.last_state = None;
                self.cues.clear();
                self.fault = Some(err);
            }
            StoreEvent::Error(err) => {
                log_store_error(&err, &format!("display room {}", self.room_id));
                telemetry::hub().record_error(DiagnosticError::StoreFeed, err.message());
                self.connection = match self.connection {
                    ConnectionState::Connected | ConnectionState::Reconnecting => {
                        ConnectionState::Reconnecting
                    }
                    ConnectionState::Connecting | ConnectionState::Offline => {
                        ConnectionState::Offline
                    }
                };
            }
        }
    }

    /// Evaluate the round at `now_ms` (adjusted clock).
    pub fn tick(&mut self, now_ms: i64) -> TickOutcome {
        if let Some(fault) = &self.fault {
            return TickOutcome {
                frame: DisplayFrame {
                    phase: TimerPhase::Idle,
                    remaining_ms: 0,
                    text: NO_ROUND_TEXT.to_string(),
                    label: FAULT_LABEL,
                    connection: self.connection,
                    fault: Some(fault.message()),
                },
                cues: Vec::new(),
                restart: None,
            };
        }

        let Some(descriptor) = &self.descriptor else {
            return TickOutcome {
                frame: DisplayFrame {
                    phase: TimerPhase::Idle,
                    remaining_ms: 0,
                    text: NO_ROUND_TEXT.to_string(),
                    label: phase_label(TimerPhase::Idle),
                    connection: self.connection,
                    fault: None,
                },
                cues: Vec::new(),
                restart: None,
            };
        };

        let start_time_ms = descriptor.start_time_ms();
        let state = compute_timer_state(&descriptor.schedule(), now_ms);
        self.last_state = Some(state);

        let cues = self.cues.observe(start_time_ms, state, descriptor.stopped);
        for cue in &cues {
            telemetry::hub().record_cue(*cue);
        }

        let mut restart = None;
        if let Some(recurring) = self.recurring.as_mut() {
            if recurring.observe(start_time_ms, state, descriptor.stopped, descriptor.recurring) {
                restart = Some(descriptor.config());
            }
        }

        TickOutcome {
            frame: DisplayFrame {
                phase: state.phase,
                remaining_ms: state.remaining_ms,
                text: format_remaining(state.remaining_ms),
                label: phase_label(state.phase),
                connection: self.connection,
                fault: None,
            },
            cues,
            restart,
        }
    }
}

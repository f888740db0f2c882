// Clock calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Clock calibration error code constants
///
/// Error code range: 3001-3004
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// The authoritative time endpoint could not be reached
    pub const PROBE_UNREACHABLE: i32 = 3001;

    /// The time endpoint answered with a non-success status
    pub const PROBE_STATUS: i32 = 3002;

    /// The time endpoint answered with an unparseable body
    pub const MALFORMED_RESPONSE: i32 = 3003;

    /// The local clock could not be read
    pub const CLOCK_UNAVAILABLE: i32 = 3004;
}

/// Log a calibration error with structured context
///
/// Calibration failures are never surfaced to the viewer; the session keeps
/// running on unsynced local time, so this log line is the only trace.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=ClockCalibrator, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Clock calibration errors
///
/// Error code ranges: 3001-3004
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Network failure reaching the time endpoint
    ProbeUnreachable { reason: String },

    /// Time endpoint returned a non-2xx status
    ProbeStatus { status: u16 },

    /// Response body missing `serverTime` or not JSON
    MalformedResponse { reason: String },

    /// Local clock is before the unix epoch or otherwise unusable
    ClockUnavailable,
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::ProbeUnreachable { .. } => CalibrationErrorCodes::PROBE_UNREACHABLE,
            CalibrationError::ProbeStatus { .. } => CalibrationErrorCodes::PROBE_STATUS,
            CalibrationError::MalformedResponse { .. } => CalibrationErrorCodes::MALFORMED_RESPONSE,
            CalibrationError::ClockUnavailable => CalibrationErrorCodes::CLOCK_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::ProbeUnreachable { reason } => {
                format!("Time probe unreachable: {}", reason)
            }
            CalibrationError::ProbeStatus { status } => {
                format!("Time probe returned HTTP {}", status)
            }
            CalibrationError::MalformedResponse { reason } => {
                format!("Malformed time probe response: {}", reason)
            }
            CalibrationError::ClockUnavailable => "Local clock unavailable".to_string(),
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}

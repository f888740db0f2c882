// Operator control error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Control error code constants
///
/// Error code range: 5001-5006
pub struct ControlErrorCodes {}

impl ControlErrorCodes {
    pub const MISSING_FIELD: i32 = 5001;
    pub const INVALID_FIELD: i32 = 5002;
    pub const UNKNOWN_COMMAND: i32 = 5003;
    pub const UNAUTHORIZED: i32 = 5004;
    pub const STORE_UNAVAILABLE: i32 = 5005;
    pub const TRANSPORT: i32 = 5006;
}

/// Log a control error with structured context
pub fn log_control_error(err: &ControlError, context: &str) {
    error!(
        "Control error in {}: code={}, component=BroadcastController, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while validating or applying START/STOP/RESET commands
///
/// No variant implies a partial write: a failed command leaves the store and
/// the operator panel untouched so the operator can retry.
///
/// Error code ranges: 5001-5006
#[derive(Debug, Clone, PartialEq)]
pub enum ControlError {
    /// Request body lacks a required field
    MissingField { field: &'static str },

    /// Request field present but invalid
    InvalidField { field: &'static str, reason: String },

    /// `type` is not START, STOP or RESET
    UnknownCommand { command: String },

    /// Shared secret missing or wrong
    Unauthorized,

    /// Round store rejected the write
    StoreUnavailable { reason: String },

    /// Operator client could not reach the control endpoint, or got non-2xx
    Transport { status: Option<u16>, reason: String },
}

impl ErrorCode for ControlError {
    fn code(&self) -> i32 {
        match self {
            ControlError::MissingField { .. } => ControlErrorCodes::MISSING_FIELD,
            ControlError::InvalidField { .. } => ControlErrorCodes::INVALID_FIELD,
            ControlError::UnknownCommand { .. } => ControlErrorCodes::UNKNOWN_COMMAND,
            ControlError::Unauthorized => ControlErrorCodes::UNAUTHORIZED,
            ControlError::StoreUnavailable { .. } => ControlErrorCodes::STORE_UNAVAILABLE,
            ControlError::Transport { .. } => ControlErrorCodes::TRANSPORT,
        }
    }

    fn message(&self) -> String {
        match self {
            ControlError::MissingField { field } => format!("Missing {}", field),
            ControlError::InvalidField { field, reason } => {
                format!("Invalid {}: {}", field, reason)
            }
            ControlError::UnknownCommand { command } => {
                format!("Unknown command type: {}", command)
            }
            ControlError::Unauthorized => "missing or invalid token".to_string(),
            ControlError::StoreUnavailable { reason } => {
                format!("Round store unavailable: {}", reason)
            }
            ControlError::Transport {
                status: Some(status),
                reason,
            } => format!("Control request failed (HTTP {}): {}", status, reason),
            ControlError::Transport {
                status: None,
                reason,
            } => format!("Control request failed: {}", reason),
        }
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ControlError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ControlError {}

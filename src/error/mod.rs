// Error types for the compsync timer
//
// This module defines the error families used across clock calibration,
// round configuration, operator control and the round store. Every family
// carries a stable numeric code so HTTP responses, logs and telemetry can
// refer to failures without string matching.

mod calibration;
mod config;
mod control;
mod store;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use config::{log_config_error, ConfigError, ConfigErrorCodes};
pub use control::{log_control_error, ControlError, ControlErrorCodes};
pub use store::{log_store_error, StoreError, StoreErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the HTTP and CLI surfaces.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

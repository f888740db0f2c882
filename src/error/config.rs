// Round configuration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 4001-4004
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    /// A required descriptor or config field is absent
    pub const MISSING_FIELD: i32 = 4001;

    /// A field is present but out of range
    pub const INVALID_FIELD: i32 = 4002;

    /// Descriptor payload could not be decoded at all
    pub const MALFORMED_DESCRIPTOR: i32 = 4003;

    /// Config file exists but could not be read or parsed
    pub const UNREADABLE_FILE: i32 = 4004;
}

/// Log a configuration error with structured context
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, component=RoundDescriptor, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised for malformed round descriptors and config files
///
/// A descriptor that fails to decode is fatal to that round's display: the
/// session shows a fault instead of defaulting the missing value and rendering
/// a wrong countdown.
///
/// Error code ranges: 4001-4004
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    MissingField { field: String },
    InvalidField { field: String, reason: String },
    MalformedDescriptor { reason: String },
    UnreadableFile { path: String, reason: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::MissingField { .. } => ConfigErrorCodes::MISSING_FIELD,
            ConfigError::InvalidField { .. } => ConfigErrorCodes::INVALID_FIELD,
            ConfigError::MalformedDescriptor { .. } => ConfigErrorCodes::MALFORMED_DESCRIPTOR,
            ConfigError::UnreadableFile { .. } => ConfigErrorCodes::UNREADABLE_FILE,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::MissingField { field } => format!("Missing field: {}", field),
            ConfigError::InvalidField { field, reason } => {
                format!("Invalid field {}: {}", field, reason)
            }
            ConfigError::MalformedDescriptor { reason } => {
                format!("Malformed round descriptor: {}", reason)
            }
            ConfigError::UnreadableFile { path, reason } => {
                format!("Cannot read config {}: {}", path, reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_codes() {
        assert_eq!(
            ConfigError::MissingField {
                field: "climbingDurationMs".to_string()
            }
            .code(),
            4001
        );
        assert_eq!(
            ConfigError::InvalidField {
                field: "startTime".to_string(),
                reason: "not RFC 3339".to_string()
            }
            .code(),
            4002
        );
        assert_eq!(
            ConfigError::MalformedDescriptor {
                reason: "eof".to_string()
            }
            .code(),
            ConfigErrorCodes::MALFORMED_DESCRIPTOR
        );
    }

    #[test]
    fn test_missing_field_message_names_field() {
        let err = ConfigError::MissingField {
            field: "climbingDurationMs".to_string(),
        };
        assert!(err.message().contains("climbingDurationMs"));
        assert!(format!("{}", err).contains("4001"));
    }
}

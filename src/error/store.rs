// Round store error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Round store error code constants
///
/// Error code range: 6001-6003
pub struct StoreErrorCodes {}

impl StoreErrorCodes {
    pub const LOCK_POISONED: i32 = 6001;
    pub const DISCONNECTED: i32 = 6002;
    pub const TRANSPORT: i32 = 6003;
}

/// Log a store error with structured context
pub fn log_store_error(err: &StoreError, context: &str) {
    error!(
        "Store error in {}: code={}, component=RoundStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors delivered on the store's error path
///
/// Subscribers treat these as connectivity problems: the last known
/// descriptor is retained and the feed keeps retrying on its own.
///
/// Error code ranges: 6001-6003
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Room table RwLock was poisoned
    LockPoisoned,

    /// Upstream feed closed the stream
    Disconnected { room_id: String },

    /// Network or HTTP failure talking to the store
    Transport { reason: String },
}

impl ErrorCode for StoreError {
    fn code(&self) -> i32 {
        match self {
            StoreError::LockPoisoned => StoreErrorCodes::LOCK_POISONED,
            StoreError::Disconnected { .. } => StoreErrorCodes::DISCONNECTED,
            StoreError::Transport { .. } => StoreErrorCodes::TRANSPORT,
        }
    }

    fn message(&self) -> String {
        match self {
            StoreError::LockPoisoned => "Round store lock poisoned".to_string(),
            StoreError::Disconnected { room_id } => {
                format!("Round feed for room {} disconnected", room_id)
            }
            StoreError::Transport { reason } => format!("Round store transport error: {}", reason),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StoreError {}

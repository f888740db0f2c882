//! Round descriptors and operator round configuration.
//!
//! A descriptor is the single persisted record per room. It is replaced
//! wholesale on START, patched on STOP and deleted on RESET. Displays never
//! see events, only the current descriptor, so everything they show must be
//! derivable from it plus their own adjusted clock.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ControlError};
use crate::timer::RoundSchedule;

/// Longest accepted room identifier.
pub const MAX_ROOM_ID_LEN: usize = 64;

/// Upper bound for each operator-supplied duration (24 hours).
pub const MAX_DURATION_MS: u64 = 24 * 60 * 60 * 1_000;

/// Operator-chosen settings for a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundConfig {
    pub climbing_duration_ms: u64,
    pub preparation_duration_ms: u64,
    pub preparation_enabled: bool,
    pub recurring: bool,
}

/// Persisted per-room round record, in its wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundDescriptor {
    /// Scheduled start on the authoritative clock (RFC 3339 on the wire)
    pub start_time: DateTime<Utc>,
    pub climbing_duration_ms: u64,
    pub preparation_duration_ms: u64,
    pub preparation_enabled: bool,
    #[serde(default)]
    pub stopped: bool,
    #[serde(default)]
    pub recurring: bool,
    /// Advisory only; never used to order or merge writes
    #[serde(default)]
    pub updated_at: i64,
}

impl RoundDescriptor {
    /// Fresh, running descriptor for `config` starting at `start_time_ms`.
    pub fn scheduled(start_time_ms: i64, config: &RoundConfig, updated_at: i64) -> Self {
        Self {
            start_time: millis_to_datetime(start_time_ms),
            climbing_duration_ms: config.climbing_duration_ms,
            preparation_duration_ms: config.preparation_duration_ms,
            preparation_enabled: config.preparation_enabled,
            stopped: false,
            recurring: config.recurring,
            updated_at,
        }
    }

    pub fn start_time_ms(&self) -> i64 {
        self.start_time.timestamp_millis()
    }

    /// Phase-engine inputs for this descriptor.
    pub fn schedule(&self) -> RoundSchedule {
        RoundSchedule {
            start_time_ms: self.start_time_ms(),
            climbing_duration_ms: self.climbing_duration_ms,
            preparation_duration_ms: self.preparation_duration_ms,
            preparation_enabled: self.preparation_enabled,
            stopped: self.stopped,
        }
    }

    /// Settings that produced this round, reused for recurring restarts.
    pub fn config(&self) -> RoundConfig {
        RoundConfig {
            climbing_duration_ms: self.climbing_duration_ms,
            preparation_duration_ms: self.preparation_duration_ms,
            preparation_enabled: self.preparation_enabled,
            recurring: self.recurring,
        }
    }
}

/// Epoch milliseconds to UTC, clamping unrepresentable values to the epoch.
pub fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// Decode a descriptor payload as delivered by the store.
///
/// `null` means the room has no round. Missing required fields are reported
/// by name instead of being defaulted.
pub fn decode_descriptor(payload: &str) -> Result<Option<RoundDescriptor>, ConfigError> {
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|err| ConfigError::MalformedDescriptor {
            reason: err.to_string(),
        })?;
    if value.is_null() {
        return Ok(None);
    }

    serde_json::from_value::<RoundDescriptor>(value)
        .map(Some)
        .map_err(|err| classify_decode_error(&err))
}

fn classify_decode_error(err: &serde_json::Error) -> ConfigError {
    let text = err.to_string();
    if let Some(rest) = text.strip_prefix("missing field `") {
        if let Some(field) = rest.split('`').next() {
            return ConfigError::MissingField {
                field: field.to_string(),
            };
        }
    }
    ConfigError::MalformedDescriptor { reason: text }
}

/// Room ids end up in URL paths and store keys: ASCII alphanumerics, `-`
/// and `_` only.
pub fn validate_room_id(room_id: &str) -> Result<(), ControlError> {
    if room_id.is_empty() {
        return Err(ControlError::MissingField { field: "roomId" });
    }
    if room_id.len() > MAX_ROOM_ID_LEN {
        return Err(ControlError::InvalidField {
            field: "roomId",
            reason: format!("longer than {} characters", MAX_ROOM_ID_LEN),
        });
    }
    if !room_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ControlError::InvalidField {
            field: "roomId",
            reason: "only letters, digits, '-' and '_' are allowed".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RoundConfig {
        RoundConfig {
            climbing_duration_ms: 300_000,
            preparation_duration_ms: 60_000,
            preparation_enabled: true,
            recurring: false,
        }
    }

    #[test]
    fn test_wire_shape_is_flat_camel_case() {
        let descriptor = RoundDescriptor::scheduled(1_700_000_003_000, &config(), 1_700_000_000_000);
        let json = serde_json::to_value(&descriptor).unwrap();

        assert_eq!(json["startTime"], "2023-11-14T22:13:23Z");
        assert_eq!(json["climbingDurationMs"], 300_000);
        assert_eq!(json["preparationDurationMs"], 60_000);
        assert_eq!(json["preparationEnabled"], true);
        assert_eq!(json["stopped"], false);
        assert_eq!(json["recurring"], false);
        assert_eq!(json["updatedAt"], 1_700_000_000_000_i64);
    }

    #[test]
    fn test_start_time_keeps_milliseconds() {
        let descriptor = RoundDescriptor::scheduled(1_700_000_003_456, &config(), 0);
        assert_eq!(descriptor.start_time_ms(), 1_700_000_003_456);

        let json = serde_json::to_string(&descriptor).unwrap();
        let decoded = decode_descriptor(&json).unwrap().unwrap();
        assert_eq!(decoded.start_time_ms(), 1_700_000_003_456);
        assert_eq!(decoded.schedule().total_ms(), 360_000);
    }

    #[test]
    fn test_decode_null_is_no_round() {
        assert_eq!(decode_descriptor("null"), Ok(None));
    }

    #[test]
    fn test_decode_reports_missing_field() {
        let payload = r#"{
            "startTime": "2024-05-01T10:00:00Z",
            "preparationDurationMs": 0,
            "preparationEnabled": false
        }"#;
        assert_eq!(
            decode_descriptor(payload),
            Err(ConfigError::MissingField {
                field: "climbingDurationMs".to_string()
            })
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_descriptor("{not json"),
            Err(ConfigError::MalformedDescriptor { .. })
        ));
        assert!(matches!(
            decode_descriptor(
                r#"{"startTime":"yesterday","climbingDurationMs":1,"preparationDurationMs":0,"preparationEnabled":false}"#
            ),
            Err(ConfigError::MalformedDescriptor { .. })
        ));
    }

    #[test]
    fn test_optional_flags_default_to_false() {
        let payload = r#"{
            "startTime": "2024-05-01T10:00:00.250Z",
            "climbingDurationMs": 240000,
            "preparationDurationMs": 0,
            "preparationEnabled": false
        }"#;
        let descriptor = decode_descriptor(payload).unwrap().unwrap();
        assert!(!descriptor.stopped);
        assert!(!descriptor.recurring);
        assert_eq!(descriptor.start_time_ms() % 1000, 250);
    }

    #[test]
    fn test_room_id_validation() {
        assert!(validate_room_id("A1B2C3").is_ok());
        assert!(validate_room_id("wall-2_finals").is_ok());
        assert_eq!(
            validate_room_id(""),
            Err(ControlError::MissingField { field: "roomId" })
        );
        assert!(validate_room_id("rooms/../x").is_err());
        assert!(validate_room_id(&"A".repeat(65)).is_err());
    }
}

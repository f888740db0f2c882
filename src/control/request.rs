// Wire types for the operator control endpoint

use serde::{Deserialize, Serialize};

use crate::error::ControlError;
use crate::round::{validate_room_id, RoundConfig, MAX_DURATION_MS};

/// Operator command kind, as spelled on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandKind {
    Start,
    Stop,
    Reset,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Start => "START",
            CommandKind::Stop => "STOP",
            CommandKind::Reset => "RESET",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "START" => Some(CommandKind::Start),
            "STOP" => Some(CommandKind::Stop),
            "RESET" => Some(CommandKind::Reset),
            _ => None,
        }
    }
}

/// Raw body of `POST /api/broadcast`.
///
/// Every field is optional at this layer so validation can name the missing
/// one instead of failing with a generic decode error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlRequest {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub climbing_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preparation_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preparation_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<bool>,
}

impl ControlRequest {
    pub fn start(room_id: &str, config: &RoundConfig) -> Self {
        Self {
            command: Some(CommandKind::Start.as_str().to_string()),
            room_id: Some(room_id.to_string()),
            climbing_duration_ms: Some(config.climbing_duration_ms),
            preparation_duration_ms: Some(config.preparation_duration_ms),
            preparation_enabled: Some(config.preparation_enabled),
            recurring: Some(config.recurring),
        }
    }

    pub fn stop(room_id: &str) -> Self {
        Self::bare(CommandKind::Stop, room_id)
    }

    pub fn reset(room_id: &str) -> Self {
        Self::bare(CommandKind::Reset, room_id)
    }

    fn bare(kind: CommandKind, room_id: &str) -> Self {
        Self {
            command: Some(kind.as_str().to_string()),
            room_id: Some(room_id.to_string()),
            ..Self::default()
        }
    }

    /// Validate into a command the controller can apply.
    pub fn into_command(self) -> Result<ControlCommand, ControlError> {
        let command = self
            .command
            .filter(|c| !c.trim().is_empty())
            .ok_or(ControlError::MissingField { field: "type" })?;
        let room_id = self
            .room_id
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .ok_or(ControlError::MissingField { field: "roomId" })?;
        validate_room_id(&room_id)?;

        let kind = CommandKind::parse(&command)
            .ok_or(ControlError::UnknownCommand { command })?;

        match kind {
            CommandKind::Start => {
                let climbing_duration_ms = self.climbing_duration_ms.ok_or(
                    ControlError::MissingField {
                        field: "climbingDurationMs",
                    },
                )?;
                if climbing_duration_ms == 0 {
                    return Err(ControlError::InvalidField {
                        field: "climbingDurationMs",
                        reason: "must be greater than zero".to_string(),
                    });
                }
                check_duration_bound("climbingDurationMs", climbing_duration_ms)?;

                let preparation_enabled = self.preparation_enabled.unwrap_or(false);
                let preparation_duration_ms = if preparation_enabled {
                    self.preparation_duration_ms
                        .ok_or(ControlError::MissingField {
                            field: "preparationDurationMs",
                        })?
                } else {
                    self.preparation_duration_ms.unwrap_or(0)
                };
                check_duration_bound("preparationDurationMs", preparation_duration_ms)?;

                Ok(ControlCommand::Start {
                    room_id,
                    config: RoundConfig {
                        climbing_duration_ms,
                        preparation_duration_ms,
                        preparation_enabled,
                        recurring: self.recurring.unwrap_or(false),
                    },
                })
            }
            CommandKind::Stop => Ok(ControlCommand::Stop { room_id }),
            CommandKind::Reset => Ok(ControlCommand::Reset { room_id }),
        }
    }
}

fn check_duration_bound(field: &'static str, value_ms: u64) -> Result<(), ControlError> {
    if value_ms > MAX_DURATION_MS {
        return Err(ControlError::InvalidField {
            field,
            reason: format!("must not exceed {} ms", MAX_DURATION_MS),
        });
    }
    Ok(())
}

/// Validated operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Start { room_id: String, config: RoundConfig },
    Stop { room_id: String },
    Reset { room_id: String },
}

impl ControlCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            ControlCommand::Start { .. } => CommandKind::Start,
            ControlCommand::Stop { .. } => CommandKind::Stop,
            ControlCommand::Reset { .. } => CommandKind::Reset,
        }
    }

    pub fn room_id(&self) -> &str {
        match self {
            ControlCommand::Start { room_id, .. }
            | ControlCommand::Stop { room_id }
            | ControlCommand::Reset { room_id } => room_id,
        }
    }
}

/// Success body of `POST /api/broadcast`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlAck {
    pub ok: bool,
    /// RFC 3339 start time, present for START only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

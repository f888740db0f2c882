//! Operator side of the control channel.
//!
//! [`OperatorClient`] posts commands to a compsync server. [`OperatorPanel`]
//! holds what an operator console shows: the room, the round settings, a
//! "running" flag and the last status line. The running flag is optimistic
//! (flipped on acknowledgement, not on observed state) and is left untouched
//! when a command fails.

use std::time::Duration;

use log::{debug, info};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;

use crate::control::{
    CommandKind, ControlAck, ControlRequest, ControlTransport, ADMIN_TOKEN_HEADER,
};
use crate::error::{ControlError, ErrorCode};
use crate::round::{validate_room_id, RoundConfig};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const ROOM_ID_LEN: usize = 6;

/// Random six-character room id, e.g. `K3Z9QA`.
pub fn generate_room_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ROOM_ID_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for `POST /api/broadcast`.
#[derive(Clone)]
pub struct OperatorClient {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl OperatorClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ControlError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ControlError::Transport {
                status: None,
                reason: err.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/broadcast", base_url.trim_end_matches('/')),
            token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ControlTransport for OperatorClient {
    async fn send(&self, request: ControlRequest) -> Result<ControlAck, ControlError> {
        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(token) = &self.token {
            builder = builder.header(ADMIN_TOKEN_HEADER, token);
        }

        let response = builder.send().await.map_err(|err| ControlError::Transport {
            status: None,
            reason: err.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("[Operator] {} rejected: {} {}", self.endpoint, status, body);
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(ControlError::Unauthorized);
            }
            let reason = serde_json::from_str::<ErrorBody>(&body)
                .map(|parsed| parsed.error)
                .unwrap_or(body);
            return Err(ControlError::Transport {
                status: Some(status.as_u16()),
                reason,
            });
        }

        response
            .json::<ControlAck>()
            .await
            .map_err(|err| ControlError::Transport {
                status: Some(status.as_u16()),
                reason: format!("unreadable acknowledgement: {}", err),
            })
    }
}

/// Operator console state for one room.
#[derive(Debug, Clone)]
pub struct OperatorPanel {
    room_id: String,
    config: RoundConfig,
    running: bool,
    status: Option<String>,
}

impl OperatorPanel {
    pub fn new(room_id: impl Into<String>, config: RoundConfig) -> Self {
        Self {
            room_id: room_id.into(),
            config,
            running: false,
            status: None,
        }
    }

    /// Panel on a freshly generated room.
    pub fn with_generated_room(config: RoundConfig) -> Self {
        Self::new(generate_room_id(), config)
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Room ids are upper-cased as typed.
    pub fn set_room_id(&mut self, room_id: &str) -> Result<(), ControlError> {
        let room_id = room_id.trim().to_ascii_uppercase();
        validate_room_id(&room_id)?;
        self.room_id = room_id;
        Ok(())
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RoundConfig {
        &mut self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Display URL for this room on `base_url`.
    pub fn display_url(&self, base_url: &str) -> String {
        format!("{}/display?room={}", base_url.trim_end_matches('/'), self.room_id)
    }

    /// Send `kind` for the current room and settings.
    pub async fn broadcast<T: ControlTransport>(
        &mut self,
        transport: &T,
        kind: CommandKind,
    ) -> Result<ControlAck, ControlError> {
        self.status = None;
        let request = match kind {
            CommandKind::Start => ControlRequest::start(&self.room_id, &self.config),
            CommandKind::Stop => ControlRequest::stop(&self.room_id),
            CommandKind::Reset => ControlRequest::reset(&self.room_id),
        };

        match transport.send(request).await {
            Ok(ack) => {
                self.running = kind == CommandKind::Start;
                self.status = Some(format!("{} sent", kind.as_str()));
                info!("[Operator] room={} {} acknowledged", self.room_id, kind.as_str());
                Ok(ack)
            }
            Err(err) => {
                self.status = Some(format!("Error: {}", err.message()));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::clock::ManualTimeSource;
    use crate::control::BroadcastController;
    use crate::store::{MemoryRoundStore, RoundStore};

    struct RejectingTransport;

    impl ControlTransport for RejectingTransport {
        async fn send(&self, _request: ControlRequest) -> Result<ControlAck, ControlError> {
            Err(ControlError::Transport {
                status: Some(503),
                reason: "store offline".to_string(),
            })
        }
    }

    fn config() -> RoundConfig {
        RoundConfig {
            climbing_duration_ms: 300_000,
            preparation_duration_ms: 60_000,
            preparation_enabled: false,
            recurring: false,
        }
    }

    fn controller() -> BroadcastController<MemoryRoundStore> {
        BroadcastController::new(
            Arc::new(MemoryRoundStore::new()),
            Arc::new(ManualTimeSource::new(1_000_000)),
            3_000,
        )
    }

    #[test]
    fn test_generated_room_id_shape() {
        let id = generate_room_id();
        assert_eq!(id.len(), 6);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert!(validate_room_id(&id).is_ok());
    }

    #[test]
    fn test_set_room_id_uppercases_and_validates() {
        let mut panel = OperatorPanel::new("ROOM01", config());
        panel.set_room_id(" wall2 ").unwrap();
        assert_eq!(panel.room_id(), "WALL2");
        assert!(panel.set_room_id("bad room").is_err());
        assert_eq!(panel.room_id(), "WALL2");
        assert_eq!(
            panel.display_url("http://10.0.0.2:8787/"),
            "http://10.0.0.2:8787/display?room=WALL2"
        );
    }

    #[tokio::test]
    async fn test_running_flag_follows_acks() {
        let controller = controller();
        let mut panel = OperatorPanel::new("ROOM01", config());

        panel.broadcast(&controller, CommandKind::Start).await.unwrap();
        assert!(panel.is_running());
        assert_eq!(panel.status(), Some("START sent"));
        assert!(controller.store().get("ROOM01").unwrap().is_some());

        panel.broadcast(&controller, CommandKind::Stop).await.unwrap();
        assert!(!panel.is_running());
        assert_eq!(panel.status(), Some("STOP sent"));

        panel.broadcast(&controller, CommandKind::Reset).await.unwrap();
        assert!(!panel.is_running());
        assert_eq!(controller.store().get("ROOM01").unwrap(), None);
    }

    #[tokio::test]
    async fn test_failure_leaves_running_flag() {
        let controller = controller();
        let mut panel = OperatorPanel::new("ROOM01", config());
        panel.broadcast(&controller, CommandKind::Start).await.unwrap();

        let err = panel
            .broadcast(&RejectingTransport, CommandKind::Stop)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Transport { status: Some(503), .. }));
        assert!(panel.is_running());
        assert_eq!(
            panel.status(),
            Some("Error: Control request failed (HTTP 503): store offline")
        );
    }

    #[tokio::test]
    async fn test_client_reports_unreachable_server() {
        let client = OperatorClient::new("http://127.0.0.1:9/", None).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9/api/broadcast");
        let err = client.send(ControlRequest::reset("ROOM01")).await.unwrap_err();
        assert!(matches!(err, ControlError::Transport { status: None, .. }));
    }
}

//! Operator control: validating and applying START/STOP/RESET.
//!
//! [`BroadcastController`] is the only writer of round descriptors. It runs
//! in the server process behind `POST /api/broadcast`; remote operators and
//! recurring displays reach it through a [`ControlTransport`].

pub mod controller;
pub mod request;

pub use controller::BroadcastController;
pub use request::{CommandKind, ControlAck, ControlCommand, ControlRequest};

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::ControlError;
use crate::round::RoundConfig;

/// Header carrying the shared operator secret. `Authorization: Bearer` and
/// a `?token=` query parameter are accepted too.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Anything that can deliver a control request and return its ack.
pub trait ControlTransport: Send + Sync {
    fn send(
        &self,
        request: ControlRequest,
    ) -> impl Future<Output = Result<ControlAck, ControlError>> + Send;
}

/// Issues a START for a room. Used by the recurring controller.
pub trait RoundStarter: Send + Sync {
    fn start_round(
        &self,
        room_id: &str,
        config: &RoundConfig,
    ) -> impl Future<Output = Result<DateTime<Utc>, ControlError>> + Send;
}

impl<T: ControlTransport> RoundStarter for T {
    async fn start_round(
        &self,
        room_id: &str,
        config: &RoundConfig,
    ) -> Result<DateTime<Utc>, ControlError> {
        let ack = self.send(ControlRequest::start(room_id, config)).await?;
        let raw = ack.start_time.ok_or(ControlError::Transport {
            status: None,
            reason: "START acknowledged without startTime".to_string(),
        })?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|err| ControlError::Transport {
                status: None,
                reason: format!("unparseable startTime {}: {}", raw, err),
            })
    }
}

// BroadcastController: the single writer of round descriptors
// Single Responsibility: turn validated operator commands into store writes

use std::sync::Arc;

use chrono::SecondsFormat;
use log::{info, warn};

use super::{ControlAck, ControlCommand, ControlRequest, ControlTransport};
use crate::clock::TimeSource;
use crate::error::{log_control_error, ControlError, StoreError};
use crate::round::{RoundConfig, RoundDescriptor};
use crate::store::RoundStore;
use crate::telemetry::{self, ControlAction};

/// Default delay between a START and the round's scheduled start, giving
/// every display time to receive the descriptor.
pub const DEFAULT_START_LEAD_MS: i64 = 3_000;

/// Applies operator commands to a [`RoundStore`]
///
/// # Notes
/// - START replaces the room's descriptor wholesale
/// - STOP patches `stopped` on an existing descriptor and is a no-op otherwise
/// - RESET deletes the descriptor; repeating it is harmless
/// - Concurrent operators are last-writer-wins
pub struct BroadcastController<S: RoundStore> {
    store: Arc<S>,
    clock: Arc<dyn TimeSource>,
    start_lead_ms: i64,
}

impl<S: RoundStore> BroadcastController<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn TimeSource>, start_lead_ms: i64) -> Self {
        Self {
            store,
            clock,
            start_lead_ms,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn start_lead_ms(&self) -> i64 {
        self.start_lead_ms
    }

    /// Schedule a new round starting `start_lead_ms` from now.
    pub fn start(&self, room_id: &str, config: &RoundConfig) -> Result<RoundDescriptor, ControlError> {
        let now = self.clock.now_ms();
        let descriptor = RoundDescriptor::scheduled(now + self.start_lead_ms, config, now);

        self.store
            .put(room_id, descriptor.clone())
            .map_err(store_unavailable)?;

        info!(
            "[BroadcastController] START room={} start={} climb={}ms prep={}ms (enabled={}) recurring={}",
            room_id,
            descriptor.start_time_ms(),
            config.climbing_duration_ms,
            config.preparation_duration_ms,
            config.preparation_enabled,
            config.recurring
        );
        telemetry::hub().record_control(ControlAction::Start, room_id, now);
        Ok(descriptor)
    }

    /// Mark the room's round stopped. Returns whether a round existed.
    pub fn stop(&self, room_id: &str) -> Result<bool, ControlError> {
        let now = self.clock.now_ms();
        let updated = self
            .store
            .update(room_id, &mut |descriptor| {
                descriptor.stopped = true;
                descriptor.updated_at = now;
            })
            .map_err(store_unavailable)?;

        if updated {
            info!("[BroadcastController] STOP room={}", room_id);
            telemetry::hub().record_control(ControlAction::Stop, room_id, now);
        } else {
            warn!(
                "[BroadcastController] STOP room={} ignored: no round to stop",
                room_id
            );
        }
        Ok(updated)
    }

    /// Remove the room's round. Returns whether a round existed.
    pub fn reset(&self, room_id: &str) -> Result<bool, ControlError> {
        let removed = self.store.remove(room_id).map_err(store_unavailable)?;
        info!(
            "[BroadcastController] RESET room={} (had round: {})",
            room_id, removed
        );
        telemetry::hub().record_control(ControlAction::Reset, room_id, self.clock.now_ms());
        Ok(removed)
    }

    pub fn apply(&self, command: ControlCommand) -> Result<ControlAck, ControlError> {
        let result = match &command {
            ControlCommand::Start { room_id, config } => self.start(room_id, config).map(|d| {
                Some(d.start_time.to_rfc3339_opts(SecondsFormat::Millis, true))
            }),
            ControlCommand::Stop { room_id } => self.stop(room_id).map(|_| None),
            ControlCommand::Reset { room_id } => self.reset(room_id).map(|_| None),
        };

        match result {
            Ok(start_time) => Ok(ControlAck {
                ok: true,
                start_time,
            }),
            Err(err) => {
                log_control_error(&err, command.kind().as_str());
                Err(err)
            }
        }
    }
}

impl<S: RoundStore> ControlTransport for BroadcastController<S> {
    async fn send(&self, request: ControlRequest) -> Result<ControlAck, ControlError> {
        self.apply(request.into_command()?)
    }
}

fn store_unavailable(err: StoreError) -> ControlError {
    ControlError::StoreUnavailable {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualTimeSource;
    use crate::control::RoundStarter;
    use crate::store::MemoryRoundStore;

    const NOW: i64 = 1_700_000_000_000;

    fn controller() -> (BroadcastController<MemoryRoundStore>, Arc<ManualTimeSource>) {
        let clock = Arc::new(ManualTimeSource::new(NOW));
        let controller = BroadcastController::new(
            Arc::new(MemoryRoundStore::new()),
            clock.clone(),
            DEFAULT_START_LEAD_MS,
        );
        (controller, clock)
    }

    fn config() -> RoundConfig {
        RoundConfig {
            climbing_duration_ms: 240_000,
            preparation_duration_ms: 15_000,
            preparation_enabled: true,
            recurring: true,
        }
    }

    #[test]
    fn test_start_schedules_with_lead() {
        let (controller, _) = controller();
        let descriptor = controller.start("ROOM01", &config()).unwrap();

        assert_eq!(descriptor.start_time_ms(), NOW + 3_000);
        assert_eq!(descriptor.updated_at, NOW);
        assert!(!descriptor.stopped);
        assert!(descriptor.recurring);
        assert_eq!(controller.store().get("ROOM01").unwrap(), Some(descriptor));
    }

    #[test]
    fn test_start_replaces_stopped_round() {
        let (controller, clock) = controller();
        controller.start("ROOM01", &config()).unwrap();
        controller.stop("ROOM01").unwrap();

        clock.advance(10_000);
        let restarted = controller.start("ROOM01", &config()).unwrap();
        assert!(!restarted.stopped);
        assert_eq!(restarted.start_time_ms(), NOW + 13_000);
    }

    #[test]
    fn test_stop_sets_flag_and_keeps_schedule() {
        let (controller, clock) = controller();
        controller.start("ROOM01", &config()).unwrap();
        clock.advance(5_000);

        assert!(controller.stop("ROOM01").unwrap());
        let stored = controller.store().get("ROOM01").unwrap().unwrap();
        assert!(stored.stopped);
        assert_eq!(stored.start_time_ms(), NOW + 3_000);
        assert_eq!(stored.updated_at, NOW + 5_000);
    }

    #[test]
    fn test_stop_without_round_is_noop() {
        let (controller, _) = controller();
        assert!(!controller.stop("EMPTY").unwrap());
        assert_eq!(controller.store().get("EMPTY").unwrap(), None);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (controller, _) = controller();
        controller.start("ROOM01", &config()).unwrap();
        assert!(controller.reset("ROOM01").unwrap());
        assert!(!controller.reset("ROOM01").unwrap());
        assert_eq!(controller.store().get("ROOM01").unwrap(), None);
    }

    #[test]
    fn test_apply_start_acks_with_start_time() {
        let (controller, _) = controller();
        let ack = controller
            .apply(ControlCommand::Start {
                room_id: "ROOM01".to_string(),
                config: config(),
            })
            .unwrap();
        assert!(ack.ok);
        assert_eq!(ack.start_time.as_deref(), Some("2023-11-14T22:13:23.000Z"));

        let ack = controller
            .apply(ControlCommand::Reset {
                room_id: "ROOM01".to_string(),
            })
            .unwrap();
        assert_eq!(ack.start_time, None);
    }

    #[tokio::test]
    async fn test_round_starter_via_transport() {
        let (controller, _) = controller();
        let start = controller.start_round("ROOM02", &config()).await.unwrap();
        assert_eq!(start.timestamp_millis(), NOW + 3_000);
        assert!(controller.store().get("ROOM02").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transport_rejects_invalid_request() {
        let (controller, _) = controller();
        let err = controller
            .send(ControlRequest {
                command: Some("START".to_string()),
                room_id: Some("ROOM01".to_string()),
                ..ControlRequest::default()
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ControlError::MissingField {
                field: "climbingDurationMs"
            }
        );
        assert_eq!(controller.store().get("ROOM01").unwrap(), None);
    }
}

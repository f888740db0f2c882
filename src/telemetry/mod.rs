//! Diagnostics telemetry collector and helpers.
//!
//! The collector multiplexes calibration results, operator actions, cue
//! firings and errors into a bounded history plus async broadcast stream.
//! History is diagnostic only: nothing in the timer reads it back, rounds
//! are derived purely from the current descriptor.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tokio::sync::broadcast;

use crate::cues::Cue;

pub mod events;

pub use events::{ControlAction, DiagnosticError, MetricEvent};

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Snapshot of collector state for HTTP/CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut history) = self.history.lock() {
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let recent = self
            .history
            .lock()
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default();
        TelemetrySnapshot {
            recent,
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Rolling window over calibration round trips.
struct RoundTripTracker {
    samples: VecDeque<f32>,
    max_samples: usize,
}

impl RoundTripTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    fn observe(&mut self, value: f32) -> (f32, f32, usize) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value.abs());

        let count = self.samples.len();
        let sum: f32 = self.samples.iter().copied().sum();
        let max = self
            .samples
            .iter()
            .copied()
            .fold(0.0_f32, |acc, next| acc.max(next));
        let avg = if count == 0 { 0.0 } else { sum / count as f32 };
        (avg, max, count)
    }
}

/// Top-level hub wrapping collector state plus derived gauges.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    round_trips: Mutex<RoundTripTracker>,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize, round_trip_window: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            round_trips: Mutex::new(RoundTripTracker::new(round_trip_window)),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    pub fn record_calibration(&self, offset_ms: i64, round_trip_ms: i64) {
        self.collector.publish(MetricEvent::Calibration {
            offset_ms,
            round_trip_ms,
        });

        let stats = self
            .round_trips
            .lock()
            .ok()
            .map(|mut tracker| tracker.observe(round_trip_ms as f32));

        if let Some((avg, max, count)) = stats {
            self.collector.publish(MetricEvent::RoundTrip {
                avg_ms: avg,
                max_ms: max,
                sample_count: count,
            });
        }
    }

    pub fn record_control(&self, action: ControlAction, room_id: &str, timestamp_ms: i64) {
        self.collector.publish(MetricEvent::Control {
            action,
            room_id: room_id.to_string(),
            timestamp_ms,
        });
    }

    pub fn record_cue(&self, cue: Cue) {
        self.collector.publish(MetricEvent::CueFired { cue });
    }

    pub fn record_error(&self, code: DiagnosticError, context: impl Into<String>) {
        self.collector.publish(MetricEvent::Error {
            code,
            context: context.into(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64, 32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(MetricEvent::Calibration {
            offset_ms: 10,
            round_trip_ms: 40,
        });
        collector.publish(MetricEvent::CueFired {
            cue: Cue::RoundStart,
        });
        collector.publish(MetricEvent::Error {
            code: DiagnosticError::StoreFeed,
            context: "disconnected".to_string(),
        });

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert!(matches!(
            snapshot.recent[0],
            MetricEvent::Calibration { offset_ms: 10, .. }
        ));
        assert!(matches!(snapshot.recent[2], MetricEvent::Error { .. }));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2);
        for offset_ms in [1, 2, 3] {
            collector.publish(MetricEvent::Calibration {
                offset_ms,
                round_trip_ms: 0,
            });
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.dropped_events, 1);
        assert!(matches!(
            snapshot.recent[0],
            MetricEvent::Calibration { offset_ms: 2, .. }
        ));
    }

    #[test]
    fn hub_tracks_round_trip_window() {
        let hub = TelemetryHub::new(8, 16, 2);
        hub.record_calibration(100, 40);
        hub.record_calibration(90, 20);
        hub.record_calibration(95, 10);

        let snapshot = hub.snapshot();
        let last = snapshot
            .recent
            .iter()
            .rev()
            .find(|event| matches!(event, MetricEvent::RoundTrip { .. }))
            .cloned();
        match last {
            Some(MetricEvent::RoundTrip {
                avg_ms,
                max_ms,
                sample_count,
            }) => {
                assert_eq!(sample_count, 2);
                assert!((avg_ms - 15.0).abs() < f32::EPSILON);
                assert!((max_ms - 20.0).abs() < f32::EPSILON);
            }
            other => panic!("Expected RoundTrip event, got {:?}", other),
        }
    }

    #[test]
    fn metric_event_serializes_with_type_tag() {
        let json = serde_json::to_value(MetricEvent::Control {
            action: ControlAction::Start,
            room_id: "ROOM01".to_string(),
            timestamp_ms: 5,
        })
        .unwrap();
        assert_eq!(json["type"], "control");
        assert_eq!(json["payload"]["action"], "start");
    }
}

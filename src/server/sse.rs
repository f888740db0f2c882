use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::{BroadcastStream, UnboundedReceiverStream};

use crate::error::ErrorCode;
use crate::store::{RoundSubscriber, StoreEvent, ERROR_EVENT, ROUND_EVENT};
use crate::telemetry;

pub type EventStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Server-Sent Events stream of a room's descriptor snapshots.
///
/// The first event is the current descriptor (or `null`); each later one is
/// the full descriptor after a write.
pub fn room_stream<F: RoundSubscriber>(feed: &F, room_id: &str) -> EventStream {
    let receiver = feed.subscribe(room_id);
    let stream = UnboundedReceiverStream::new(receiver).filter_map(|event| async move {
        match event {
            StoreEvent::Snapshot(descriptor) => match serde_json::to_string(&descriptor) {
                Ok(payload) => Some(Ok(Event::default().event(ROUND_EVENT).data(payload))),
                Err(_) => None,
            },
            StoreEvent::Error(err) => {
                Some(Ok(Event::default().event(ERROR_EVENT).data(err.message())))
            }
            StoreEvent::Malformed(_) => None,
        }
    });

    with_keepalive(Box::pin(stream))
}

/// Server-Sent Events stream of live telemetry.
pub fn telemetry_stream() -> EventStream {
    let receiver = telemetry::hub().collector().subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(payload) => Some(Ok(Event::default().event("telemetry").data(payload))),
                Err(_) => None,
            },
            Err(_) => None,
        }
    });

    with_keepalive(Box::pin(stream))
}

fn with_keepalive(
    stream: Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>,
) -> EventStream {
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEPALIVE_INTERVAL)
            .text("keepalive"),
    )
}

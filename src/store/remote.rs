//! Remote round feed over Server-Sent Events.
//!
//! Displays on other machines follow a room through the server's
//! `GET /api/rooms/{room}/stream` endpoint. Each SSE `round` message carries
//! the full descriptor JSON (or `null`). The feed reconnects on its own after
//! a fixed delay and reports every drop on the error path, so the display can
//! show its reconnecting indicator while keeping the last descriptor.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;

use super::{RoundSubscriber, StoreEvent};
use crate::error::{log_store_error, StoreError};
use crate::round::decode_descriptor;

/// SSE event name carrying descriptor snapshots.
pub const ROUND_EVENT: &str = "round";
/// SSE event name carrying server-side store errors.
pub const ERROR_EVENT: &str = "error";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// One dispatched SSE message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Handles chunks split anywhere, including mid-line. Comment lines (used
/// for keep-alives) and `id:`/`retry:` fields are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.pending.extend_from_slice(chunk);
        let mut messages = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(|c| c == '\n' || c == '\r');

            if line.is_empty() {
                if !self.data.is_empty() {
                    messages.push(SseMessage {
                        event: self.event.take(),
                        data: self.data.join("\n"),
                    });
                    self.data.clear();
                }
                self.event = None;
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "data" => self.data.push(value.to_string()),
                "event" => self.event = Some(value.to_string()),
                _ => {}
            }
        }

        messages
    }
}

/// Subscriber following rooms on a remote compsync server.
#[derive(Clone)]
pub struct RemoteRoundFeed {
    client: reqwest::Client,
    base_url: String,
    reconnect_delay: Duration,
}

impl RemoteRoundFeed {
    pub fn new(base_url: &str, reconnect_delay: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            reconnect_delay,
        })
    }

    pub fn stream_url(&self, room_id: &str) -> String {
        format!("{}/api/rooms/{}/stream", self.base_url, room_id)
    }
}

impl RoundSubscriber for RemoteRoundFeed {
    fn subscribe(&self, room_id: &str) -> mpsc::UnboundedReceiver<StoreEvent> {
        let (tx, out) = mpsc::unbounded_channel();
        let feed = FeedTask {
            client: self.client.clone(),
            url: self.stream_url(room_id),
            room_id: room_id.to_string(),
            reconnect_delay: self.reconnect_delay,
            tx,
        };
        tokio::spawn(feed.run());
        out
    }
}

struct FeedTask {
    client: reqwest::Client,
    url: String,
    room_id: String,
    reconnect_delay: Duration,
    tx: mpsc::UnboundedSender<StoreEvent>,
}

impl FeedTask {
    async fn run(self) {
        loop {
            let outcome = tokio::select! {
                outcome = self.stream_once() => outcome,
                _ = self.tx.closed() => break,
            };
            if self.tx.is_closed() {
                break;
            }

            let err = match outcome {
                Ok(()) => StoreError::Disconnected {
                    room_id: self.room_id.clone(),
                },
                Err(err) => err,
            };
            log_store_error(&err, "RemoteRoundFeed");
            if self.tx.send(StoreEvent::Error(err)).is_err() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = self.tx.closed() => break,
            }
        }
        log::debug!("[RoundFeed] {} unsubscribed", self.room_id);
    }

    /// Follow the stream until the server closes it or a chunk fails.
    async fn stream_once(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Transport {
                reason: format!("HTTP {} from {}", status.as_u16(), self.url),
            });
        }
        log::info!("[RoundFeed] following {}", self.url);

        let mut decoder = SseDecoder::default();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(transport)?;
            for message in decoder.push(&chunk) {
                if self.tx.send(to_store_event(message)).is_err() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

fn to_store_event(message: SseMessage) -> StoreEvent {
    if message.event.as_deref() == Some(ERROR_EVENT) {
        return StoreEvent::Error(StoreError::Transport {
            reason: message.data,
        });
    }
    match decode_descriptor(&message.data) {
        Ok(descriptor) => StoreEvent::Snapshot(descriptor),
        Err(err) => StoreEvent::Malformed(err),
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: round\nda").is_empty());
        assert!(decoder.push(b"ta: null\n").is_empty());
        let messages = decoder.push(b"\n");
        assert_eq!(
            messages,
            vec![SseMessage {
                event: Some("round".to_string()),
                data: "null".to_string(),
            }]
        );
    }

    #[test]
    fn test_decoder_skips_keepalive_and_joins_data_lines() {
        let mut decoder = SseDecoder::default();
        let messages = decoder.push(b":keepalive\n\ndata: {\"a\":\r\ndata: 1}\r\n\r\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].event, None);
        assert_eq!(messages[0].data, "{\"a\":\n1}");
    }

    #[test]
    fn test_decoder_emits_multiple_messages_per_chunk() {
        let mut decoder = SseDecoder::default();
        let messages = decoder.push(b"data: 1\n\ndata: 2\n\n");
        let data: Vec<&str> = messages.iter().map(|m| m.data.as_str()).collect();
        assert_eq!(data, vec!["1", "2"]);
    }

    #[test]
    fn test_store_event_mapping() {
        let snapshot = to_store_event(SseMessage {
            event: Some(ROUND_EVENT.to_string()),
            data: "null".to_string(),
        });
        assert_eq!(snapshot, StoreEvent::Snapshot(None));

        let malformed = to_store_event(SseMessage {
            event: Some(ROUND_EVENT.to_string()),
            data: r#"{"startTime":"2024-05-01T10:00:00Z"}"#.to_string(),
        });
        assert!(matches!(
            malformed,
            StoreEvent::Malformed(ConfigError::MissingField { .. })
        ));

        let error = to_store_event(SseMessage {
            event: Some(ERROR_EVENT.to_string()),
            data: "lock poisoned".to_string(),
        });
        assert!(matches!(error, StoreEvent::Error(StoreError::Transport { .. })));
    }

    #[test]
    fn test_stream_url() {
        let feed = RemoteRoundFeed::new("http://10.0.0.2:8787/", Duration::from_millis(10)).unwrap();
        assert_eq!(
            feed.stream_url("ROOM01"),
            "http://10.0.0.2:8787/api/rooms/ROOM01/stream"
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_on_error_path() {
        let feed = RemoteRoundFeed::new("http://127.0.0.1:9", Duration::from_millis(10)).unwrap();
        let mut rx = feed.subscribe("ROOM01");
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("feed should report within timeout")
            .expect("feed closed");
        assert!(matches!(event, StoreEvent::Error(StoreError::Transport { .. })));
    }
}

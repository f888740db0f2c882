// TimeProbe - reads the authoritative clock over HTTP

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// Body of `GET /api/time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTimeResponse {
    #[serde(rename = "serverTime")]
    pub server_time: i64,
}

/// One round trip to the authoritative clock.
pub trait TimeProbe: Send + Sync {
    /// Ask the authoritative source for its current epoch milliseconds.
    fn server_time_ms(&self) -> impl Future<Output = Result<i64, CalibrationError>> + Send;
}

/// Time probe hitting the compsync server's `/api/time` endpoint.
pub struct HttpTimeProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpTimeProbe {
    /// Connect attempts give up after this long so an unreachable server
    /// fails the probe instead of stalling session startup.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn new(base_url: &str) -> Result<Self, CalibrationError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .timeout(Self::CONNECT_TIMEOUT * 2)
            .build()
            .map_err(|err| CalibrationError::ProbeUnreachable {
                reason: err.to_string(),
            })?;
        Ok(Self {
            client,
            url: format!("{}/api/time", base_url.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TimeProbe for HttpTimeProbe {
    async fn server_time_ms(&self) -> Result<i64, CalibrationError> {
        let response = self.client.get(&self.url).send().await.map_err(|err| {
            CalibrationError::ProbeUnreachable {
                reason: err.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalibrationError::ProbeStatus {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| CalibrationError::ProbeUnreachable {
                reason: err.to_string(),
            })?;

        parse_server_time(&body)
    }
}

/// Decode a `{ "serverTime": <ms> }` body.
pub fn parse_server_time(body: &[u8]) -> Result<i64, CalibrationError> {
    serde_json::from_slice::<ServerTimeResponse>(body)
        .map(|parsed| parsed.server_time)
        .map_err(|err| CalibrationError::MalformedResponse {
            reason: err.to_string(),
        })
}

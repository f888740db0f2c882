//! Configuration management for the timer server and display clients
//!
//! This module provides runtime configuration loading from JSON files so
//! venue-specific values (listen address, shared secret, default round
//! durations, start lead time) can be changed without recompiling. Missing or
//! invalid files fall back to defaults with a warning.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::round::RoundConfig;

/// Environment variable overriding `server.bind_addr`
pub const ADDR_ENV: &str = "COMPSYNC_ADDR";

/// Environment variable overriding `server.admin_token`
pub const TOKEN_ENV: &str = "COMPSYNC_TOKEN";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub round: RoundDefaults,
    pub broadcast: BroadcastConfig,
    pub display: DisplayConfig,
}

/// HTTP server parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for the control/time/store endpoints
    pub bind_addr: String,
    /// Shared operator secret; `None` leaves the control endpoint open
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".to_string(),
            admin_token: None,
        }
    }
}

/// Operator-side defaults used when a START omits values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundDefaults {
    pub climbing_duration_ms: u64,
    pub preparation_duration_ms: u64,
    pub preparation_enabled: bool,
    pub recurring: bool,
}

impl Default for RoundDefaults {
    fn default() -> Self {
        Self {
            climbing_duration_ms: 300_000,
            preparation_duration_ms: 60_000,
            preparation_enabled: false,
            recurring: false,
        }
    }
}

impl RoundDefaults {
    pub fn to_round_config(&self) -> RoundConfig {
        RoundConfig {
            climbing_duration_ms: self.climbing_duration_ms,
            preparation_duration_ms: self.preparation_duration_ms,
            preparation_enabled: self.preparation_enabled,
            recurring: self.recurring,
        }
    }
}

/// Broadcast controller parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Gap between a START and its scheduled instant, giving every
    /// subscriber time to receive the new descriptor
    pub start_lead_ms: i64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            start_lead_ms: 3_000,
        }
    }
}

/// Display client parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Base URL of the compsync server (time probe + round feed)
    pub server_url: String,
    /// Scheduling loop period while a round is live
    pub tick_interval_ms: u64,
    /// Start with cues muted
    pub muted: bool,
    /// Delay before the round feed reconnects after a transport error
    pub reconnect_delay_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8787".to_string(),
            tick_interval_ms: 50,
            muted: false,
            reconnect_delay_ms: 2_000,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or defaults if the file doesn't exist or the
    /// JSON is invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Strict variant of [`AppConfig::load_from_file`] for an explicitly
    /// requested file: unreadable or invalid files are errors, not defaults.
    pub fn try_load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| ConfigError::UnreadableFile {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let config: Self =
            serde_json::from_str(&contents).map_err(|err| ConfigError::InvalidField {
                field: path.display().to_string(),
                reason: err.to_string(),
            })?;
        config.validate()?;
        log::info!("[Config] Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Reject values no component can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidField {
                field: "server.bind_addr".to_string(),
                reason: format!("not a socket address: {}", self.server.bind_addr),
            });
        }
        if self.round.climbing_duration_ms == 0 {
            return Err(ConfigError::InvalidField {
                field: "round.climbing_duration_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.display.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidField {
                field: "display.tick_interval_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.broadcast.start_lead_ms < 0 {
            return Err(ConfigError::InvalidField {
                field: "broadcast.start_lead_ms".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }

    /// Load `compsync.json` from the working directory, then apply
    /// environment overrides.
    pub fn load() -> Self {
        Self::load_from_file("compsync.json").with_env_overrides()
    }

    /// Apply `COMPSYNC_ADDR` / `COMPSYNC_TOKEN` if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(addr) = std::env::var(ADDR_ENV) {
            self.server.bind_addr = addr;
        }
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            self.server.admin_token = Some(token).filter(|t| !t.is_empty());
        }
        self
    }
}

// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Layered with figment: built-in defaults, then `huddle.toml` / `huddle.json`
//! (or an explicit path), then `HUDDLE_`-prefixed environment variables.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use huddle_common::IceServer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::meeting::DEFAULT_AUDIO_SPOTLIGHT_THRESHOLD;
use crate::registry::DEFAULT_RESERVATION_TTL_SECS;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "huddle.toml";
const ENV_PREFIX: &str = "HUDDLE_";
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Data directory path (shared-file metadata)
    pub data_dir: PathBuf,
    /// Log level
    pub log_level: String,
    /// Log format
    pub log_format: LogFormat,
    /// Audio level above which a speaker is auto-spotlighted
    pub audio_spotlight_threshold: f64,
    /// Minimum time between recording-permission changes
    pub recording_debounce_ms: u64,
    /// Largest file a participant may announce
    pub max_file_size_bytes: u64,
    /// Lifetime of a meeting ID reserved over HTTP that no host has claimed
    pub reservation_ttl_secs: u64,
    /// STUN/TURN servers handed to browsers
    pub ice_servers: Vec<IceServer>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            audio_spotlight_threshold: DEFAULT_AUDIO_SPOTLIGHT_THRESHOLD,
            recording_debounce_ms: 1500,
            max_file_size_bytes: 100 * 1024 * 1024, // 100 MiB
            reservation_ttl_secs: DEFAULT_RESERVATION_TTL_SECS,
            ice_servers: vec![IceServer {
                urls: vec![
                    "stun:stun.l.google.com:19302".to_string(),
                    "stun:stun1.l.google.com:19302".to_string(),
                ],
                username: None,
                credential: None,
            }],
        }
    }
}

impl Settings {
    /// Load settings from `huddle.toml` in the working directory and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load settings from an explicit TOML or JSON file and the environment
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let file = if path.extension().is_some_and(|ext| ext == "json") {
            Figment::new().merge(Json::file(path))
        } else {
            Figment::new().merge(Toml::file(path))
        };

        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(Box::new)?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid {
                field: "log_level",
                reason: format!("expected one of {VALID_LOG_LEVELS:?}"),
            });
        }

        if !(0.0..1.0).contains(&self.audio_spotlight_threshold) {
            return Err(ConfigError::Invalid {
                field: "audio_spotlight_threshold",
                reason: "must be in [0, 1)".to_string(),
            });
        }

        if self.max_file_size_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_file_size_bytes",
                reason: "must be positive".to_string(),
            });
        }

        if self.reservation_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "reservation_ttl_secs",
                reason: "must be positive".to_string(),
            });
        }

        if self.ice_servers.iter().any(|server| server.urls.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "ice_servers",
                reason: "every entry needs at least one URL".to_string(),
            });
        }

        Ok(())
    }

    pub fn recording_debounce(&self) -> Duration {
        Duration::from_millis(self.recording_debounce_ms)
    }

    pub fn reservation_ttl(&self) -> Duration {
        Duration::from_secs(self.reservation_ttl_secs)
    }
}

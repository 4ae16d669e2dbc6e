//! PoseTrack configuration
//!
//! Stored as pretty-printed JSON. Every field has a default, so a partial
//! file (or no file at all) yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::protocol::DEFAULT_EVENT_PORT;
use crate::window::DEFAULT_MAX_POINTS;

/// Environment variable overriding the event port
pub const PORT_ENV: &str = "PORT";

/// Errors while loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Invalid config file: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Could not determine the user config directory")]
    NoConfigDir,
}

/// Top-level configuration stored in config.json
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseTrackConfig {
    /// Network settings for the tracking server
    pub server: ServerConfig,

    /// Client-side session behavior
    pub session: SessionConfig,

    /// Rep counting thresholds and frame pacing
    pub tracking: TrackingConfig,
}

/// Tracking server network settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Port of the JSON event channel
    pub event_port: u16,

    /// Port of the MJPEG video feed
    pub video_port: u16,

    /// HTTP path of the video feed
    pub video_path: String,

    /// Per-client outbound queue length before a slow client starts lagging
    pub broadcast_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            event_port: DEFAULT_EVENT_PORT,
            video_port: DEFAULT_EVENT_PORT + 1,
            video_path: "/video_feed".to_string(),
            broadcast_capacity: 256,
        }
    }
}

/// Client session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Points retained per chart channel
    pub max_points: usize,

    /// Clear chart series when tracking stops
    pub clear_series_on_stop: bool,

    /// URL of the live video feed shown while tracking
    pub video_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_points: DEFAULT_MAX_POINTS,
            clear_series_on_stop: false,
            video_url: format!("http://localhost:{}/video_feed", DEFAULT_EVENT_PORT + 1),
        }
    }
}

/// Rep counting and frame pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Elbow angle above which the arm counts as extended (degrees)
    pub down_threshold: f64,

    /// Elbow angle below which an extended arm completes a rep (degrees)
    pub up_threshold: f64,

    /// Interval between processed frames in milliseconds
    pub frame_interval_ms: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            down_threshold: 160.0,
            up_threshold: 30.0,
            frame_interval_ms: 33,
        }
    }
}

impl PoseTrackConfig {
    /// Default config file location (`<config dir>/posetrack/config.json`)
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join("posetrack").join("config.json"))
    }

    /// Load a config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: PoseTrackConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, falling back to defaults when it does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save as pretty-printed JSON, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Apply environment overrides (`PORT` moves the server's ports)
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`.
    ///
    /// `PORT` sets the event port. A video port still sitting right above
    /// the old event port moves along with it.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(PORT_ENV) {
            let port = parse_port(&value)?;
            let server = &mut self.server;
            if server.event_port.checked_add(1) == Some(server.video_port) {
                server.video_port = port.checked_add(1).ok_or_else(|| {
                    ConfigError::InvalidValue {
                        field: PORT_ENV.to_string(),
                        message: format!("{} leaves no room for the video port", port),
                    }
                })?;
            }
            server.event_port = port;
        }
        Ok(())
    }

    /// Reject settings the server or session cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tracking = &self.tracking;
        if tracking.up_threshold >= tracking.down_threshold {
            return Err(ConfigError::InvalidValue {
                field: "tracking.up_threshold".to_string(),
                message: format!(
                    "must be below down_threshold ({})",
                    tracking.down_threshold
                ),
            });
        }
        if !(0.0..=180.0).contains(&tracking.up_threshold)
            || !(0.0..=180.0).contains(&tracking.down_threshold)
        {
            return Err(ConfigError::InvalidValue {
                field: "tracking".to_string(),
                message: "thresholds must lie within 0..=180 degrees".to_string(),
            });
        }
        if tracking.frame_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tracking.frame_interval_ms".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.session.max_points == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.max_points".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.server.broadcast_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.broadcast_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let server = &self.server;
        if server.event_port != 0 && server.event_port == server.video_port {
            return Err(ConfigError::InvalidValue {
                field: "server.video_port".to_string(),
                message: format!("collides with event_port ({})", server.event_port),
            });
        }
        if !self.server.video_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "server.video_path".to_string(),
                message: "must start with '/'".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|e| ConfigError::InvalidValue {
            field: PORT_ENV.to_string(),
            message: format!("'{}': {}", value, e),
        })
}

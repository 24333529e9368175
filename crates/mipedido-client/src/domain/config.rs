//! Client configuration and its TOML persistence.
//!
//! Reads and writes [`ClientConfig`] at the platform-appropriate path:
//! - Windows:  `%APPDATA%\MiPedido\config.toml`
//! - Linux:    `~/.config/mipedido/config.toml`
//! - macOS:    `~/Library/Application Support/MiPedido/config.toml`
//!
//! ```toml
//! log_level = "info"
//!
//! [session]
//! ws_base_url = "ws://wattson.02loveslollipop.uk/ws/orderNotification"
//! topic = "orders"
//! ping_interval_secs = 30
//! close_timeout_secs = 5
//! ```
//!
//! Every field has a serde default, so a missing file or a file written by an
//! older build still loads.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mipedido_core::is_unreserved;
use mipedido_core::protocol::DEFAULT_TOPIC;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The topic must be non-empty and URL-unreserved; it goes into the
    /// session query string unescaped.
    #[error("invalid session topic {0:?}: use only A-Z a-z 0-9 - _ . ~")]
    InvalidTopic(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// `tracing` level for the binary: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Settings for the real-time notification session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    /// Notification endpoint, without the query string.
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,
    /// Topic sent as the `topic` query parameter.
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Keep-alive ping period.  There is no read timeout; idle sessions are
    /// normal while the kitchen works.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// How long a caller-initiated close waits for the server's close reply.
    #[serde(default = "default_close_timeout_secs")]
    pub close_timeout_secs: u64,
}

impl SessionConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }

    /// Checks the values that end up in the session URL.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidTopic`] if `topic` is empty or contains a
    /// character outside the URL-unreserved set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic.is_empty() || !self.topic.chars().all(is_unreserved) {
            return Err(ConfigError::InvalidTopic(self.topic.clone()));
        }
        Ok(())
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_ws_base_url() -> String {
    "ws://wattson.02loveslollipop.uk/ws/orderNotification".to_string()
}
fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}
fn default_ping_interval_secs() -> u64 {
    30
}
fn default_close_timeout_secs() -> u64 {
    5
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ws_base_url: default_ws_base_url(),
            topic: default_topic(),
            ping_interval_secs: default_ping_interval_secs(),
            close_timeout_secs: default_close_timeout_secs(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config from the platform path, or defaults if it does not exist.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `ClientConfig` from `path`, returning `ClientConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::InvalidTopic`] if the session topic is not URL-safe.
pub fn load_config_from(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let config: ClientConfig = toml::from_str(&content)?;
            config.session.validate()?;
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("MiPedido"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("mipedido"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("MiPedido")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

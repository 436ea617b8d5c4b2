//! Server configuration.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - TOML configuration file (`PARLOR_CONFIG`, or the first default path that exists)
//! - Environment variables (`PARLOR_PORT`, `PARLOR_ROOM__PATH`, ...)

use anyhow::{Context, Result};
use parlor_core::HubConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Default config file locations, in search order.
const CONFIG_PATHS: [&str; 3] = [
    "parlor.toml",
    "/etc/parlor/parlor.toml",
    "~/.config/parlor/parlor.toml",
];

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Room configuration.
    #[serde(default)]
    pub room: RoomConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Room configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Path of the WebSocket endpoint.
    #[serde(default = "default_room_path")]
    pub path: String,

    /// Undelivered messages a member may have queued before eviction.
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,

    /// Depth of the hub's request queues.
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,

    /// Avatar resolvers to try, in order (`auth`, `gravatar`).
    #[serde(default = "default_avatars")]
    pub avatars: Vec<String>,

    /// Emit room trace events at debug level.
    #[serde(default)]
    pub trace: bool,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,

    /// Seconds between hub statistics samples.
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_room_path() -> String {
    "/room".to_string()
}

fn default_outbox_capacity() -> usize {
    parlor_core::DEFAULT_OUTBOX_CAPACITY
}

fn default_request_capacity() -> usize {
    64
}

fn default_avatars() -> Vec<String> {
    vec!["auth".to_string(), "gravatar".to_string()]
}

fn default_max_message_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_sample_interval() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            room: RoomConfig::default(),
            limits: LimitsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            path: default_room_path(),
            outbox_capacity: default_outbox_capacity(),
            request_capacity: default_request_capacity(),
            avatars: default_avatars(),
            trace: false,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
            sample_interval_secs: default_sample_interval(),
        }
    }
}

/// `PARLOR_*` overrides, e.g. `PARLOR_PORT` or `PARLOR_ROOM__AVATARS=gravatar,auth`.
fn environment() -> config::Environment {
    config::Environment::with_prefix("PARLOR")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("room.avatars")
        .try_parsing(true)
}

impl Config {
    /// Load configuration from file, environment and defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or an
    /// environment override has the wrong type.
    pub fn load() -> Result<Self> {
        let path = std::env::var("PARLOR_CONFIG").ok().or_else(|| {
            CONFIG_PATHS
                .iter()
                .map(|path| shellexpand::tilde(path).into_owned())
                .find(|path| Path::new(path).exists())
        });

        Self::from_sources(path.as_deref())
    }

    /// Load configuration from an optional TOML file plus the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_sources(path: Option<&str>) -> Result<Self> {
        Self::from_layers(path, environment())
    }

    fn from_layers(path: Option<&str>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::new(path, config::FileFormat::Toml));
        }

        let config = builder
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize::<Config>())
            .with_context(|| match path {
                Some(path) => format!("Failed to load config file: {}", path),
                None => "Failed to load config from environment".to_string(),
            })?;

        Ok(config)
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a valid address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    /// Hub settings derived from the room section.
    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            outbox_capacity: self.room.outbox_capacity,
            request_capacity: self.room.request_capacity,
        }
    }
}

//! Configuration loading and management.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity.
    pub server: ServerConfig,
    /// Network listen configuration.
    pub listen: ListenConfig,
    /// Optional TLS listen configuration.
    pub tls: Option<TlsConfig>,
    /// Optional WebSocket listen configuration.
    pub websocket: Option<WebSocketConfig>,
    /// Identity assertion verification.
    pub auth: AuthConfig,
    /// Rooms and message retention.
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name (e.g., "chat.straylight.net").
    pub name: String,
    /// Node id prefixed onto every connection id (3 characters).
    pub node_id: String,
    /// Port for the HTTP surface (`/metrics`, `/api/*`).
    /// Convention: 0 disables the HTTP endpoint (used by tests).
    pub http_port: Option<u16>,
}

/// Network listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:7400").
    pub address: SocketAddr,
}

/// TLS listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// Address to bind to for TLS (e.g., "0.0.0.0:7401").
    pub address: SocketAddr,
    /// Path to certificate file (PEM format).
    pub cert_path: String,
    /// Path to private key file (PEM format).
    pub key_path: String,
}

/// WebSocket listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Address to bind to for WebSocket upgrades (e.g., "0.0.0.0:7402").
    pub address: SocketAddr,
    /// Allowed Origin header values. Empty means allow all.
    #[serde(default)]
    pub allow_origins: Vec<String>,
}

/// Identity assertion configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret shared with the external auth service.
    pub secret: String,
    /// Seconds a fresh connection gets to present its assertion.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
}

fn default_handshake_timeout() -> u64 {
    10
}

/// Room provisioning and message retention.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// The fixed set of valid room names, known at startup.
    #[serde(default = "default_rooms")]
    pub rooms: Vec<String>,
    /// Room every authenticated connection is placed in on connect.
    #[serde(default = "default_room")]
    pub default_room: String,
    /// Maximum messages retained per room; oldest evicted first.
    #[serde(default = "default_retention")]
    pub retention: usize,
}

fn default_rooms() -> Vec<String> {
    vec!["general".to_string(), "random".to_string(), "tech".to_string()]
}

fn default_room() -> String {
    "general".to_string()
}

fn default_retention() -> usize {
    100
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            rooms: default_rooms(),
            default_room: default_room(),
            retention: default_retention(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chat.rooms.is_empty() {
            return Err(ConfigError::Invalid("chat.rooms must not be empty".into()));
        }
        if !self.chat.rooms.contains(&self.chat.default_room) {
            return Err(ConfigError::Invalid(format!(
                "chat.default_room {:?} is not in chat.rooms",
                self.chat.default_room
            )));
        }
        if self.chat.retention == 0 {
            return Err(ConfigError::Invalid("chat.retention must be at least 1".into()));
        }
        if self.server.node_id.len() != 3 {
            return Err(ConfigError::Invalid(
                "server.node_id must be exactly 3 characters".into(),
            ));
        }
        Ok(())
    }
}

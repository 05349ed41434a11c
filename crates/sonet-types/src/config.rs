//! Global configuration types for sonet.
//!
//! `GlobalConfig` represents the top-level `config.toml`. Every section and
//! field has a default, so an empty file (or no file) yields a working setup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.sonet/config.toml` (or `$SONET_DATA_DIR/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// SQLite URL of the social-graph database. `None` means
    /// `{data_dir}/sonet.db`.
    #[serde(default)]
    pub database_url: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: None,
        }
    }
}

/// Tuning knobs for the chat hub and its sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Capacity of each hub input channel (join, leave, message, command).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Capacity of each session's outbound queue.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,

    /// How long the hub waits on a full outbound queue before giving up on
    /// that write.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Upper bound on a single social-graph lookup made by the hub.
    #[serde(default = "default_graph_query_timeout_ms")]
    pub graph_query_timeout_ms: u64,

    /// Disconnect a session after this many seconds without inbound traffic.
    /// `0` disables the idle timeout.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_channel_capacity() -> usize {
    256
}

fn default_outbound_capacity() -> usize {
    256
}

fn default_write_timeout_ms() -> u64 {
    5_000
}

fn default_graph_query_timeout_ms() -> u64 {
    2_000
}

fn default_idle_timeout_secs() -> u64 {
    300
}

impl ChatConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn graph_query_timeout(&self) -> Duration {
        Duration::from_millis(self.graph_query_timeout_ms)
    }

    /// Idle timeout, or `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            outbound_capacity: default_outbound_capacity(),
            write_timeout_ms: default_write_timeout_ms(),
            graph_query_timeout_ms: default_graph_query_timeout_ms(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

/// How a WebSocket caller proves who they are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Name of the cookie carrying the caller's username.
    #[serde(default = "default_username_cookie")]
    pub username_cookie: String,

    /// Base64-encoded key (at least 64 bytes decoded) used to verify signed
    /// username cookies. When absent the cookie value is trusted as-is.
    #[serde(default)]
    pub cookie_signing_key: Option<String>,
}

fn default_username_cookie() -> String {
    "username".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username_cookie: default_username_cookie(),
            cookie_signing_key: None,
        }
    }
}

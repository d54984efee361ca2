//! Configuration structs
//!
//! Every section has defaults, so an empty file (or no file) is a valid
//! configuration for local use.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GobConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub model: ModelConfig,
    pub auth: AuthConfig,
    pub streaming: StreamingConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
}

/// SQLite database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u32,
    /// Memory-mapped I/O in bytes, 0 disables it
    pub mmap_size: u64,
}

/// Model file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
}

/// Authorization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Auth scheme file; without one nothing is restricted
    pub scheme_path: Option<PathBuf>,
    /// Header carrying the caller's comma separated roles
    pub roles_header: String,
    /// Header carrying the caller's user id
    pub user_header: String,
}

/// Response streaming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Entities buffered between the query task and the response body
    pub channel_capacity: usize,
    /// Append `{"complete": true, "count": N}` after the last entity
    pub terminal_marker: bool,
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("gob.db"),
            busy_timeout_ms: 5000,
            mmap_size: 0,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("gobmodel.json"),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            scheme_path: None,
            roles_header: "X-Auth-Roles".to_string(),
            user_header: "X-Auth-Userid".to_string(),
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            terminal_marker: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl GobConfig {
    /// Reject values the service cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                field: "server.port",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.streaming.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "streaming.channel_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.auth.roles_header.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "auth.roles_header",
                reason: "must name a header".to_string(),
            });
        }
        Ok(())
    }
}

impl ServerConfig {
    /// `host:port` for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

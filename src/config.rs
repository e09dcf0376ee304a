//! Configuration for the remote-control server
//!
//! Loaded from a TOML file. Every section falls back to its defaults, so a
//! file only needs the entries it overrides:
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 40000
//!
//! [session]
//! poll_timeout_ms = 100
//! accept_timeout_ms = 1
//!
//! [logging]
//! level = "info"
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default TCP port of the mobile remote-control server
pub const DEFAULT_PORT: u16 = 40000;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listening socket configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (e.g. `0.0.0.0` for all, `127.0.0.1` for local only)
    pub bind_address: String,
    /// TCP port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Session thread timing and limits
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wait used while idle on a connected client. Bounds the latency
    /// between a quit request and thread exit.
    pub poll_timeout_ms: u64,
    /// Bounded wait of each accept poll while no client is connected
    pub accept_timeout_ms: u64,
    /// Largest length-prefixed frame a client will accept
    pub max_payload_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 100,
            accept_timeout_ms: 1,
            max_payload_bytes: 64 * 1024 * 1024,
        }
    }
}

impl SessionConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms.max(1))
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RemoteConfig {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use mobile_remote::config::RemoteConfig;
    ///
    /// let config = RemoteConfig::from_file("remote.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: RemoteConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// `bind_address:port` string for the listening socket
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}

//! Configuration Module
//!
//! Handles loading the demo server configuration from environment variables.

use std::env;

/// Demo server configuration parameters.
///
/// All values can be configured via environment variables with sensible
/// defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Default entry TTL in seconds
    pub default_ttl: u64,
    /// Ceiling on cacheable body size in bytes
    pub max_body_bytes: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DEFAULT_TTL` - Default entry TTL in seconds (default: 60)
    /// - `MAX_BODY_BYTES` - Max cacheable body size (default: 1048576)
    pub fn from_env() -> Self {
        Self {
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            default_ttl: env::var("DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            max_body_bytes: env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024 * 1024),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            default_ttl: 60,
            max_body_bytes: 1024 * 1024,
        }
    }
}

//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

use crate::util::rate_limit::DEFAULT_INPUT_RATE_LIMIT;
use crate::util::time::{DEFAULT_TICK_RATE_HZ, MAX_TICK_RATE_HZ};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, `*` for any
    pub client_origin: String,

    /// Simulation ticks per second for every room
    pub tick_rate_hz: u32,
    /// Capacity of each connection's outbound queue
    pub outbound_buffer: usize,
    /// Inbound WebSocket frames allowed per second per connection
    pub input_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Some(port) = lookup("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string())
        };

        let tick_rate_hz = parse_or(&lookup, "TICK_RATE_HZ", DEFAULT_TICK_RATE_HZ)?;
        if tick_rate_hz == 0 || tick_rate_hz > MAX_TICK_RATE_HZ {
            return Err(ConfigError::OutOfRange("TICK_RATE_HZ"));
        }

        let outbound_buffer = parse_or(&lookup, "OUTBOUND_BUFFER", 256usize)?;
        if outbound_buffer == 0 {
            return Err(ConfigError::OutOfRange("OUTBOUND_BUFFER"));
        }

        let input_rate_limit = parse_or(&lookup, "INPUT_RATE_LIMIT", DEFAULT_INPUT_RATE_LIMIT)?;
        if input_rate_limit == 0 {
            return Err(ConfigError::OutOfRange("INPUT_RATE_LIMIT"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),

            tick_rate_hz,
            outbound_buffer,
            input_rate_limit,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Environment variable out of range: {0}")]
    OutOfRange(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

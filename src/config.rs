use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

use crate::domain::inspector::DEFAULT_CAPACITY;

pub const DEFAULT_STDIO_INIT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    pub stdio_init_timeout: Duration,
    /// Overrides terminal detection of the stdio peer when set.
    pub stdio_interactive: Option<bool>,
    pub inspector_capacity: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("invalid bind address or port")]
    InvalidSocket,
    #[error("STDIO_INIT_TIMEOUT_SECS must be a positive integer")]
    InvalidInitTimeout,
    #[error("STDIO_INTERACTIVE must be true or false")]
    InvalidInteractive,
    #[error("INSPECTOR_CAPACITY must be a positive integer")]
    InvalidInspectorCapacity,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bind_addr = value("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());
        let bind_port = value("BIND_PORT")
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);
        let init_timeout_secs = value("STDIO_INIT_TIMEOUT_SECS")
            .map(|value| {
                value
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or(ConfigError::InvalidInitTimeout)
            })
            .transpose()?
            .unwrap_or(DEFAULT_STDIO_INIT_TIMEOUT_SECS);
        let stdio_interactive = value("STDIO_INTERACTIVE")
            .map(|value| match value.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConfigError::InvalidInteractive),
            })
            .transpose()?;
        let inspector_capacity = value("INSPECTOR_CAPACITY")
            .map(|value| {
                value
                    .parse::<usize>()
                    .ok()
                    .filter(|capacity| *capacity > 0)
                    .ok_or(ConfigError::InvalidInspectorCapacity)
            })
            .transpose()?
            .unwrap_or(DEFAULT_CAPACITY);

        let config = Self {
            bind_addr,
            bind_port,
            stdio_init_timeout: Duration::from_secs(init_timeout_secs),
            stdio_interactive,
            inspector_capacity,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn parse_defaults() {
        let config = parse(&[]).expect("config should parse");
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.bind_port, 8080);
        assert_eq!(config.stdio_init_timeout, Duration::from_secs(10));
        assert_eq!(config.stdio_interactive, None);
        assert_eq!(config.inspector_capacity, 100);
    }

    #[test]
    fn parses_overrides() {
        let config = parse(&[
            ("BIND_ADDR", "0.0.0.0"),
            ("BIND_PORT", "9090"),
            ("STDIO_INIT_TIMEOUT_SECS", "3"),
            ("STDIO_INTERACTIVE", "False"),
            ("INSPECTOR_CAPACITY", "5"),
        ])
        .expect("config should parse");

        assert_eq!(config.bind_socket().expect("socket").port(), 9090);
        assert_eq!(config.stdio_init_timeout, Duration::from_secs(3));
        assert_eq!(config.stdio_interactive, Some(false));
        assert_eq!(config.inspector_capacity, 5);
    }

    #[test]
    fn invalid_port_fails() {
        let err = parse(&[("BIND_PORT", "70000")]).expect_err("port out of range");
        assert!(matches!(err, ConfigError::InvalidPort));
    }

    #[test]
    fn invalid_bind_addr_fails() {
        let err = parse(&[("BIND_ADDR", "not an address")]).expect_err("bad address");
        assert!(matches!(err, ConfigError::InvalidSocket));
    }

    #[test]
    fn zero_timeout_fails() {
        let err = parse(&[("STDIO_INIT_TIMEOUT_SECS", "0")]).expect_err("zero timeout");
        assert!(matches!(err, ConfigError::InvalidInitTimeout));
    }

    #[test]
    fn unrecognized_interactive_flag_fails() {
        let err = parse(&[("STDIO_INTERACTIVE", "maybe")]).expect_err("bad flag");
        assert!(matches!(err, ConfigError::InvalidInteractive));
    }

    #[test]
    fn zero_capacity_fails() {
        let err = parse(&[("INSPECTOR_CAPACITY", "0")]).expect_err("zero capacity");
        assert!(matches!(err, ConfigError::InvalidInspectorCapacity));
    }
}

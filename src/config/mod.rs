//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::util::time::DEFAULT_TICK_INTERVAL_MS;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Simulation period
    pub tick_interval: Duration,
    /// Insert thrown hooks into the live world
    pub register_hooks: bool,
    /// Allowed client origins for CORS, permissive when unset
    pub client_origin: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3001".to_string()),
        };

        let tick_ms = match lookup("TICK_INTERVAL_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => return Err(ConfigError::Invalid("TICK_INTERVAL_MS", raw)),
            },
            None => DEFAULT_TICK_INTERVAL_MS,
        };

        let register_hooks = match lookup("HOOK_REGISTRATION") {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::Invalid("HOOK_REGISTRATION", raw)),
            },
            None => false,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            tick_interval: Duration::from_millis(tick_ms),
            register_hooks,
            client_origin: lookup("CLIENT_ORIGIN").filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for environment variable {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:3001".parse::<SocketAddr>().unwrap());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.tick_interval, Duration::from_millis(16));
        assert!(!config.register_hooks);
        assert_eq!(config.client_origin, None);
    }

    #[test]
    fn test_port_overrides_server_addr() {
        let config = load(&[("PORT", "4000"), ("SERVER_ADDR", "127.0.0.1:9000")]).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:4000".parse::<SocketAddr>().unwrap());

        let config = load(&[("SERVER_ADDR", "127.0.0.1:9000")]).unwrap();
        assert_eq!(config.server_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("TICK_INTERVAL_MS", "33"),
            ("HOOK_REGISTRATION", "true"),
            ("LOG_LEVEL", "debug"),
            ("CLIENT_ORIGIN", "http://localhost:3000"),
        ])
        .unwrap();
        assert_eq!(config.tick_interval, Duration::from_millis(33));
        assert!(config.register_hooks);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.client_origin.as_deref(), Some("http://localhost:3000"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(load(&[("SERVER_ADDR", "nowhere")]), Err(ConfigError::InvalidAddress)));
        assert!(matches!(
            load(&[("TICK_INTERVAL_MS", "0")]),
            Err(ConfigError::Invalid("TICK_INTERVAL_MS", _))
        ));
        assert!(matches!(
            load(&[("HOOK_REGISTRATION", "maybe")]),
            Err(ConfigError::Invalid("HOOK_REGISTRATION", _))
        ));
    }
}

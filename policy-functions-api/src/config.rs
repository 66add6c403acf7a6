//! Server configuration from environment variables

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Settings read at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bound on waiting for a function app deployment
    pub deployment_timeout: Duration,
    /// Location used by the default template parameters
    pub default_location: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            deployment_timeout: Duration::from_secs(1800),
            default_location: "westus2".to_string(),
        }
    }
}

impl ServerConfig {
    /// Read `HOST`, `PORT`, `DEPLOYMENT_TIMEOUT_SECS` and `DEFAULT_LOCATION`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: port.clone(),
            })?;
        }
        if let Some(secs) = lookup("DEPLOYMENT_TIMEOUT_SECS") {
            let parsed: u64 = secs.parse().map_err(|_| ConfigError::InvalidValue {
                name: "DEPLOYMENT_TIMEOUT_SECS",
                value: secs.clone(),
            })?;
            if parsed == 0 {
                return Err(ConfigError::InvalidValue {
                    name: "DEPLOYMENT_TIMEOUT_SECS",
                    value: secs,
                });
            }
            config.deployment_timeout = Duration::from_secs(parsed);
        }
        if let Some(location) = lookup("DEFAULT_LOCATION") {
            config.default_location = location;
        }

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.deployment_timeout, Duration::from_secs(1800));
        assert_eq!(config.default_location, "westus2");
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "9090"),
            ("DEPLOYMENT_TIMEOUT_SECS", "60"),
            ("DEFAULT_LOCATION", "eastus"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.deployment_timeout, Duration::from_secs(60));
        assert_eq!(config.default_location, "eastus");
    }

    #[test]
    fn test_invalid_values() {
        assert!(ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("DEPLOYMENT_TIMEOUT_SECS", "0")])).is_err());
    }
}

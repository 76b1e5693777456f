use crate::config::helpers::{optional_env, parse_optional_env};
use crate::error::ConfigError;

/// HTTP API configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

impl HttpConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: optional_env("HTTP_HOST")?.unwrap_or(defaults.host),
            port: parse_optional_env("HTTP_PORT", defaults.port)?,
        })
    }
}

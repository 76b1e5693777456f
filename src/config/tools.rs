use std::time::Duration;

use secrecy::SecretString;

use crate::config::helpers::{optional_env, parse_optional_env};
use crate::error::ConfigError;

/// Credentials and limits for the built-in tools.
///
/// Missing credentials do not fail startup; the affected tool reports
/// itself as not configured when called.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub pinata_api_key: Option<SecretString>,
    pub pinata_secret_api_key: Option<SecretString>,
    pub pinata_api_url: String,
    pub pinata_gateway_url: String,
    pub google_cse_api_key: Option<SecretString>,
    pub google_cse_id: Option<String>,
    pub google_cse_url: String,
    /// MongoDB connection string for the podcast catalogue.
    pub mongo_url: Option<SecretString>,
    /// Upper bound on any single tool execution.
    pub timeout: Duration,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            pinata_api_key: None,
            pinata_secret_api_key: None,
            pinata_api_url: "https://api.pinata.cloud".to_string(),
            pinata_gateway_url: "https://gateway.pinata.cloud/ipfs".to_string(),
            google_cse_api_key: None,
            google_cse_id: None,
            google_cse_url: "https://www.googleapis.com/customsearch/v1".to_string(),
            mongo_url: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl ToolsConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            pinata_api_key: optional_env("PINATA_API_KEY")?.map(SecretString::from),
            pinata_secret_api_key: optional_env("PINATA_SECRET_API_KEY")?.map(SecretString::from),
            pinata_api_url: optional_env("PINATA_API_URL")?.unwrap_or(defaults.pinata_api_url),
            pinata_gateway_url: optional_env("PINATA_GATEWAY_URL")?
                .unwrap_or(defaults.pinata_gateway_url),
            google_cse_api_key: optional_env("GOOGLE_CSE_API_KEY")?.map(SecretString::from),
            google_cse_id: optional_env("GOOGLE_CSE_ID")?,
            google_cse_url: optional_env("GOOGLE_CSE_URL")?.unwrap_or(defaults.google_cse_url),
            mongo_url: optional_env("MONGO_URL")?.map(SecretString::from),
            timeout: Duration::from_secs(parse_optional_env(
                "TOOL_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
        })
    }
}

use secrecy::SecretString;

use crate::config::helpers::{optional_env, required_env};
use crate::error::ConfigError;

/// Instructions used when the agent creates its own assistant.
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are a proactive assistant that takes immediate action whenever possible. \
Use the available tools instead of describing what you would do, and report \
tool errors plainly so the user can correct the request.

When you reply to the user:
- Format your main points as bullet points, each starting with a relevant emoji.
- Use Markdown for formatting (e.g., **bold**, `code`, and [links](https://example.com)).
- Format every URL as a Markdown link so it is clickable in the UI.
- Avoid long paragraphs; be concise and visually clear.";

/// Remote assistant service configuration.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// API key for the assistant service.
    pub api_key: SecretString,
    /// Base URL of the service (with or without the `/v1` suffix).
    pub base_url: String,
    /// Existing assistant to use. When unset one is created on first use.
    pub assistant_id: Option<String>,
    /// Name given to a newly created assistant.
    pub name: String,
    /// Model used by a newly created assistant.
    pub model: String,
    /// Instructions given to a newly created assistant.
    pub instructions: String,
    /// Maximum retries for transient request failures.
    pub max_retries: u32,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl AssistantConfig {
    /// Configuration pointing at `base_url` with default assistant settings.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: base_url.into(),
            assistant_id: None,
            name: "Onchain Agent".to_string(),
            model: "gpt-4o-mini".to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            max_retries: 3,
            request_timeout_secs: 60,
        }
    }

    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let api_key = required_env(
            "OPENAI_API_KEY",
            "Set it in the environment or in a .env file.",
        )?;
        let base_url =
            optional_env("OPENAI_BASE_URL")?.unwrap_or_else(|| "https://api.openai.com".to_string());
        url::Url::parse(&base_url).map_err(|e| ConfigError::InvalidValue {
            key: "OPENAI_BASE_URL".to_string(),
            message: e.to_string(),
        })?;

        let defaults = Self::new(api_key, base_url);

        Ok(Self {
            assistant_id: optional_env("ASSISTANT_ID")?,
            name: optional_env("ASSISTANT_NAME")?.unwrap_or(defaults.name.clone()),
            model: optional_env("ASSISTANT_MODEL")?.unwrap_or(defaults.model.clone()),
            instructions: optional_env("ASSISTANT_INSTRUCTIONS")?
                .unwrap_or(defaults.instructions.clone()),
            max_retries: crate::config::helpers::parse_optional_env(
                "OPENAI_MAX_RETRIES",
                defaults.max_retries,
            )?,
            request_timeout_secs: crate::config::helpers::parse_optional_env(
                "OPENAI_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            ..defaults
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::helpers::ENV_MUTEX;
    use secrecy::ExposeSecret;

    fn clear_assistant_env() {
        // SAFETY: Only called under ENV_MUTEX in tests.
        unsafe {
            for key in [
                "OPENAI_API_KEY",
                "OPENAI_BASE_URL",
                "ASSISTANT_ID",
                "ASSISTANT_NAME",
                "ASSISTANT_MODEL",
                "ASSISTANT_INSTRUCTIONS",
                "OPENAI_MAX_RETRIES",
                "OPENAI_REQUEST_TIMEOUT_SECS",
            ] {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn missing_api_key_is_reported() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_assistant_env();

        let err = AssistantConfig::resolve().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "OPENAI_API_KEY"));
    }

    #[test]
    fn resolves_overrides() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_assistant_env();

        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("OPENAI_API_KEY", "sk-test");
            std::env::set_var("ASSISTANT_ID", "asst_123");
            std::env::set_var("ASSISTANT_MODEL", "gpt-4o");
        }

        let config = AssistantConfig::resolve().expect("resolve should succeed");
        assert_eq!(config.api_key.expose_secret(), "sk-test");
        assert_eq!(config.assistant_id.as_deref(), Some("asst_123"));
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.base_url, "https://api.openai.com");
        assert_eq!(config.instructions, DEFAULT_INSTRUCTIONS);

        clear_assistant_env();
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_assistant_env();

        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("OPENAI_API_KEY", "sk-test");
            std::env::set_var("OPENAI_BASE_URL", "not a url");
        }

        let err = AssistantConfig::resolve().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "OPENAI_BASE_URL"));

        clear_assistant_env();
    }
}

use std::str::FromStr;

use crate::error::ConfigError;

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Read an environment variable, treating empty values as unset.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value is not valid UTF-8".to_string(),
        }),
    }
}

/// Read a required environment variable.
pub(crate) fn required_env(key: &str, hint: &str) -> Result<String, ConfigError> {
    optional_env(key)?.ok_or_else(|| ConfigError::MissingRequired {
        key: key.to_string(),
        hint: hint.to_string(),
    })
}

/// Parse an environment variable, falling back to `default` when unset.
pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| s.trim().parse())
        .transpose()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
        .map(|v| v.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_optional_env_falls_back_and_parses() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");

        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::remove_var("ONCHAIN_AGENT_TEST_PORT");
        }
        assert_eq!(parse_optional_env("ONCHAIN_AGENT_TEST_PORT", 3001u16).unwrap(), 3001);

        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("ONCHAIN_AGENT_TEST_PORT", " 8080 ");
        }
        assert_eq!(parse_optional_env("ONCHAIN_AGENT_TEST_PORT", 3001u16).unwrap(), 8080);

        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("ONCHAIN_AGENT_TEST_PORT", "eighty");
        }
        let err = parse_optional_env("ONCHAIN_AGENT_TEST_PORT", 3001u16).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "ONCHAIN_AGENT_TEST_PORT"));

        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::remove_var("ONCHAIN_AGENT_TEST_PORT");
        }
    }

    #[test]
    fn empty_values_are_unset() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");

        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("ONCHAIN_AGENT_TEST_EMPTY", "   ");
        }
        assert_eq!(optional_env("ONCHAIN_AGENT_TEST_EMPTY").unwrap(), None);
        assert!(required_env("ONCHAIN_AGENT_TEST_EMPTY", "set it").is_err());

        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::remove_var("ONCHAIN_AGENT_TEST_EMPTY");
        }
    }
}

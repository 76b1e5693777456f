use std::time::Duration;

use crate::config::helpers::parse_optional_env;
use crate::error::ConfigError;

/// Bounds and pacing for the run driver loop.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum tool-call rounds (dispatch + submit) per run.
    pub max_iterations: u32,
    /// Wall-clock budget for one run.
    pub timeout: Duration,
    /// Delay between status polls while a run is queued or in progress.
    pub poll_interval: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl RunConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_iterations = parse_optional_env("RUN_MAX_ITERATIONS", defaults.max_iterations)?;
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RUN_MAX_ITERATIONS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            max_iterations,
            timeout: Duration::from_secs(parse_optional_env(
                "RUN_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
            poll_interval: Duration::from_millis(parse_optional_env(
                "RUN_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )?),
        })
    }
}

use super::error::ConfigError;
use super::loader::ensure_env_loaded;
use std::env;
use std::time::Duration;

pub const API_KEY_VAR: &str = "LLM_API_KEY";
pub const BASE_URL_VAR: &str = "LLM_BASE_URL";
pub const MODEL_VAR: &str = "LLM_MODEL";
pub const TIMEOUT_VAR: &str = "LLM_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for the chat-completions endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl ModelSettings {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read settings from the process environment (after loading `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        ensure_env_loaded();
        let endpoint = required(BASE_URL_VAR)?;
        let api_key = required(API_KEY_VAR)?;
        let model = required(MODEL_VAR)?;
        let mut settings = Self::new(endpoint, api_key, model);

        if let Ok(raw) = env::var(TIMEOUT_VAR) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidEnv {
                    name: TIMEOUT_VAR,
                    value: raw.clone(),
                })?;
            settings.timeout = Duration::from_secs(secs);
        }

        Ok(settings)
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::MissingEnv { name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        unsafe {
            env::remove_var(API_KEY_VAR);
            env::remove_var(BASE_URL_VAR);
            env::remove_var(MODEL_VAR);
            env::remove_var(TIMEOUT_VAR);
        }
    }

    #[test]
    #[serial]
    fn reads_required_variables() {
        clear();
        unsafe {
            env::set_var(API_KEY_VAR, "secret");
            env::set_var(BASE_URL_VAR, "http://localhost:4000/v1/chat/completions");
            env::set_var(MODEL_VAR, "test-model");
            env::set_var(TIMEOUT_VAR, "5");
        }
        let settings = ModelSettings::from_env().expect("settings");
        assert_eq!(settings.model, "test-model");
        assert_eq!(settings.timeout, Duration::from_secs(5));
        clear();
    }

    #[test]
    #[serial]
    fn missing_api_key_is_reported_by_name() {
        clear();
        unsafe {
            env::set_var(BASE_URL_VAR, "http://localhost:4000");
            env::set_var(MODEL_VAR, "test-model");
        }
        let err = ModelSettings::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv { name } if name == API_KEY_VAR));
        clear();
    }
}

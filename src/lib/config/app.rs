use super::error::ConfigError;
use super::loader::ProviderStore;
use super::model::ModelSettings;
use super::provider::ProviderConfig;
use crate::constants::DEFAULT_MAX_ROUNDS;
use std::path::Path;

/// Everything the binary needs to build a session registry.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub providers: Vec<ProviderConfig>,
    pub model: ModelSettings,
    pub max_rounds: usize,
    pub heartbeat: bool,
}

impl AppConfig {
    /// Load providers from `path` and model settings from the environment
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let providers = ProviderStore::new(path).load_or_empty()?;
        let model = ModelSettings::from_env()?;
        Ok(Self {
            providers,
            model,
            max_rounds: DEFAULT_MAX_ROUNDS,
            heartbeat: true,
        })
    }
}

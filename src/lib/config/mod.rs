pub mod app;
pub mod error;
pub mod loader;
pub mod model;
pub mod provider;

pub use crate::constants::{CONFIG_PATH, ENV_PATH};

pub use app::AppConfig;
pub use error::ConfigError;
pub use loader::{ProviderStore, ensure_env_loaded, parse_servers};
pub use model::ModelSettings;
pub use provider::{LocalProcessConfig, ProviderConfig, StreamedRemoteConfig, TransportConfig};

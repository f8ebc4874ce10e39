use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading, validating or persisting configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write config to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("provider '{provider}' must define either 'url' (SSE) or 'command' (stdio)")]
    MissingTransport { provider: String },

    #[error("provider '{provider}' has an empty command")]
    EmptyCommand { provider: String },

    #[error("provider '{provider}' has an invalid url '{url}': {reason}")]
    InvalidUrl {
        provider: String,
        url: String,
        reason: String,
    },

    #[error("provider '{provider}' has an invalid header '{header}'")]
    InvalidHeader { provider: String, header: String },

    #[error("provider name cannot be empty")]
    EmptyProviderName,

    #[error("provider '{provider}' entry is not a JSON object")]
    MalformedEntry { provider: String },

    #[error("required environment variable {name} is not set")]
    MissingEnv { name: &'static str },

    #[error("environment variable {name} has an invalid value '{value}'")]
    InvalidEnv { name: &'static str, value: String },
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::NotFound { path } => {
                format!("Provider configuration {} does not exist.", path.display())
            }
            ConfigError::MissingEnv { name } => {
                format!("Set {name} in the environment or the .env file before starting.")
            }
            other => other.to_string(),
        }
    }
}

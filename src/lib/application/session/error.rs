use crate::application::tooling::ProviderError;
use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to start session '{session_id}': {source}")]
    Provider {
        session_id: String,
        #[source]
        source: ProviderError,
    },
    #[error("session '{session_id}' was torn down while it was being created")]
    TornDown { session_id: String },
    #[error("MCP server '{name}' could not be reached: {source}")]
    Probe {
        name: String,
        #[source]
        source: ProviderError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Provider { source, .. } => {
                format!("Could not connect to every MCP server: {}", source.user_message())
            }
            SessionError::TornDown { .. } => "The session was closed while starting.".to_string(),
            SessionError::Probe { name, source } => {
                format!("MCP server '{name}' is not reachable: {}", source.user_message())
            }
            SessionError::Config(err) => err.user_message(),
        }
    }
}

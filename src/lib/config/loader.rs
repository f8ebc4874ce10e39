use super::ENV_PATH;
use super::error::ConfigError;
use super::provider::ProviderConfig;
use dotenvy::from_filename;
use serde_json::{Map as JsonMap, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{debug, info};

static ENV_LOADER: Once = Once::new();

const SERVERS_KEY: &str = "mcpServers";

/// Ensures environment variables are loaded from the `.env` file
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = from_filename(ENV_PATH);
    });
}

/// File-backed list of provider definitions.
///
/// Reads are done fresh each time so edits made by other tools are picked up.
#[derive(Debug, Clone)]
pub struct ProviderStore {
    path: PathBuf,
}

impl ProviderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every configured provider in file order.
    pub fn load(&self) -> Result<Vec<ProviderConfig>, ConfigError> {
        let document = self.read_document()?;
        let providers = parse_servers(&document)?;
        info!(
            path = %self.path.display(),
            provider_count = providers.len(),
            "Loaded provider configuration"
        );
        Ok(providers)
    }

    /// Like [`ProviderStore::load`] but treats a missing file as an empty list.
    pub fn load_or_empty(&self) -> Result<Vec<ProviderConfig>, ConfigError> {
        match self.load() {
            Err(ConfigError::NotFound { path }) => {
                info!(path = %path.display(), "Provider configuration missing, starting empty");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Insert (or replace) one provider entry and rewrite the file.
    pub fn append(&self, provider: &ProviderConfig) -> Result<(), ConfigError> {
        let mut document = match self.read_document() {
            Ok(document) => document,
            Err(ConfigError::NotFound { .. }) => Value::Object(JsonMap::new()),
            Err(err) => return Err(err),
        };

        let root = document
            .as_object_mut()
            .ok_or_else(|| ConfigError::MalformedEntry {
                provider: SERVERS_KEY.to_string(),
            })?;
        let servers = root
            .entry(SERVERS_KEY)
            .or_insert_with(|| Value::Object(JsonMap::new()));
        let servers = servers
            .as_object_mut()
            .ok_or_else(|| ConfigError::MalformedEntry {
                provider: SERVERS_KEY.to_string(),
            })?;
        servers.insert(provider.name.clone(), provider.to_entry());

        self.write_document(&document)?;
        debug!(
            path = %self.path.display(),
            provider = provider.name.as_str(),
            "Persisted provider entry"
        );
        Ok(())
    }

    /// Drop one provider entry and rewrite the file. Returns whether the
    /// entry was present; a missing file counts as absent.
    pub fn remove(&self, name: &str) -> Result<bool, ConfigError> {
        let mut document = match self.read_document() {
            Ok(document) => document,
            Err(ConfigError::NotFound { .. }) => return Ok(false),
            Err(err) => return Err(err),
        };

        let removed = document
            .get_mut(SERVERS_KEY)
            .and_then(Value::as_object_mut)
            .is_some_and(|servers| servers.shift_remove(name).is_some());
        if !removed {
            return Ok(false);
        }

        self.write_document(&document)?;
        debug!(path = %self.path.display(), provider = name, "Removed provider entry");
        Ok(true)
    }

    fn read_document(&self) -> Result<Value, ConfigError> {
        debug!(path = %self.path.display(), "Reading provider configuration file");
        let content = fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: self.path.clone(),
                }
            } else {
                ConfigError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write_document(&self, document: &Value) -> Result<(), ConfigError> {
        let rendered = serde_json::to_string_pretty(document).map_err(|source| {
            ConfigError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, rendered).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Parse the `mcpServers` map of a configuration document.
pub fn parse_servers(document: &Value) -> Result<Vec<ProviderConfig>, ConfigError> {
    let Some(servers) = document.get(SERVERS_KEY) else {
        return Ok(Vec::new());
    };
    let servers = servers
        .as_object()
        .ok_or_else(|| ConfigError::MalformedEntry {
            provider: SERVERS_KEY.to_string(),
        })?;

    servers
        .iter()
        .map(|(name, entry)| ProviderConfig::from_entry(name, entry))
        .collect()
}

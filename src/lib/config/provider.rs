//! # Provider Configuration
//!
//! Definitions of the external tool providers a session connects to.
//! Each entry of the `mcpServers` map selects its transport by shape:
//!
//! | Keys | Transport | Notes |
//! |------|-----------|-------|
//! | `url`, `headers` | streamed-remote (SSE) | URL must be absolute |
//! | `command`, `args`, `env`, `workdir` | local-process (stdio) | values are shell-expanded |

use super::error::ConfigError;
use reqwest::Url;
use reqwest::header::{HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value, json};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// A named tool provider and how to reach it.
///
/// # Example
///
/// ```json
/// {
///   "mcpServers": {
///     "filesystem": { "command": "npx", "args": ["-y", "@mcp/fs", "~/notes"] },
///     "search": { "url": "https://tools.example.com/sse", "headers": { "X-Key": "abc" } }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub name: String,
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    LocalProcess(LocalProcessConfig),
    StreamedRemote(StreamedRemoteConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalProcessConfig {
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub workdir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedRemoteConfig {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawServer {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    workdir: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

impl ProviderConfig {
    pub fn local_process(name: impl Into<String>, command: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            transport: TransportConfig::LocalProcess(LocalProcessConfig {
                command: command.into(),
                args: Vec::new(),
                env: HashMap::new(),
                workdir: None,
            }),
        }
    }

    pub fn streamed_remote(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportConfig::StreamedRemote(StreamedRemoteConfig {
                url: url.into(),
                headers: BTreeMap::new(),
            }),
        }
    }

    /// Parse one `mcpServers` entry.
    pub fn from_entry(name: &str, entry: &Value) -> Result<Self, ConfigError> {
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyProviderName);
        }
        if !entry.is_object() {
            return Err(ConfigError::MalformedEntry {
                provider: name.to_string(),
            });
        }
        let raw: RawServer =
            serde_json::from_value(entry.clone()).map_err(|_| ConfigError::MalformedEntry {
                provider: name.to_string(),
            })?;
        Self::from_raw(name, raw)
    }

    pub(crate) fn from_raw(name: &str, raw: RawServer) -> Result<Self, ConfigError> {
        let transport = if let Some(url) = raw.url {
            TransportConfig::StreamedRemote(StreamedRemoteConfig::validated(
                name,
                url,
                raw.headers,
            )?)
        } else if let Some(command) = raw.command {
            let command = expand(&command);
            if command.trim().is_empty() {
                return Err(ConfigError::EmptyCommand {
                    provider: name.to_string(),
                });
            }
            TransportConfig::LocalProcess(LocalProcessConfig {
                command: PathBuf::from(command),
                args: raw.args.iter().map(|arg| expand(arg)).collect(),
                env: raw.env,
                workdir: raw.workdir.map(|dir| PathBuf::from(expand(&dir))),
            })
        } else {
            return Err(ConfigError::MissingTransport {
                provider: name.to_string(),
            });
        };

        Ok(Self {
            name: name.to_string(),
            transport,
        })
    }

    /// Serialize back into the `mcpServers` entry shape.
    pub fn to_entry(&self) -> Value {
        match &self.transport {
            TransportConfig::LocalProcess(local) => {
                let mut entry = JsonMap::new();
                entry.insert(
                    "command".to_string(),
                    Value::String(local.command.to_string_lossy().into_owned()),
                );
                entry.insert("args".to_string(), json!(local.args));
                entry.insert("env".to_string(), json!(local.env));
                if let Some(dir) = &local.workdir {
                    entry.insert(
                        "workdir".to_string(),
                        Value::String(dir.to_string_lossy().into_owned()),
                    );
                }
                Value::Object(entry)
            }
            TransportConfig::StreamedRemote(remote) => {
                json!({ "url": remote.url, "headers": remote.headers })
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.transport {
            TransportConfig::LocalProcess(_) => "stdio",
            TransportConfig::StreamedRemote(_) => "sse",
        }
    }
}

impl StreamedRemoteConfig {
    fn validated(
        provider: &str,
        url: String,
        headers: BTreeMap<String, String>,
    ) -> Result<Self, ConfigError> {
        Url::parse(&url).map_err(|err| ConfigError::InvalidUrl {
            provider: provider.to_string(),
            url: url.clone(),
            reason: err.to_string(),
        })?;
        for (key, value) in &headers {
            if HeaderName::from_bytes(key.as_bytes()).is_err()
                || HeaderValue::from_str(value).is_err()
            {
                return Err(ConfigError::InvalidHeader {
                    provider: provider.to_string(),
                    header: key.clone(),
                });
            }
        }
        Ok(Self { url, headers })
    }
}

fn expand(value: &str) -> String {
    shellexpand::full(value)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

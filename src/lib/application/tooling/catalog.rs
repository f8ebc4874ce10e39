use super::interface::{ConnectionState, ProviderConnection};
use crate::types::ToolDescriptor;
use std::sync::Arc;
use tracing::debug;

/// Tool lookup across every attached provider connection.
///
/// Names are not de-duplicated; the first connection listing a tool owns it.
#[derive(Clone, Default)]
pub struct CapabilityCatalog {
    connections: Vec<Arc<dyn ProviderConnection>>,
}

impl CapabilityCatalog {
    pub fn new(connections: Vec<Arc<dyn ProviderConnection>>) -> Self {
        Self { connections }
    }

    pub fn connections(&self) -> &[Arc<dyn ProviderConnection>] {
        &self.connections
    }

    /// Descriptors of all Ready connections, in attachment order.
    pub async fn list_tools(&self) -> Vec<Arc<ToolDescriptor>> {
        let mut tools = Vec::new();
        for connection in &self.connections {
            if connection.state().await != ConnectionState::Ready {
                continue;
            }
            match connection.list_tools().await {
                Ok(listed) => tools.extend(listed),
                Err(err) => debug!(server = connection.name(), %err, "skipping provider tools"),
            }
        }
        tools
    }

    pub async fn resolve(&self, tool_name: &str) -> Option<Arc<dyn ProviderConnection>> {
        for connection in &self.connections {
            if connection.state().await != ConnectionState::Ready {
                continue;
            }
            let Ok(tools) = connection.list_tools().await else {
                continue;
            };
            if tools.iter().any(|tool| tool.name == tool_name) {
                return Some(Arc::clone(connection));
            }
        }
        None
    }

    /// Server instructions gathered during the handshakes, tagged by provider.
    pub async fn instructions(&self) -> Vec<(String, String)> {
        let mut collected = Vec::new();
        for connection in &self.connections {
            if let Some(text) = connection.instructions().await {
                collected.push((connection.name().to_string(), text));
            }
        }
        collected
    }
}

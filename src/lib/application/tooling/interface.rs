use super::error::ProviderError;
use crate::types::ToolDescriptor;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One live connection to a tool provider.
///
/// Both transports expose the same four operations; transport-specific
/// retry and reconnection behaviour lives behind them.
#[async_trait]
pub trait ProviderConnection: Send + Sync {
    fn name(&self) -> &str;

    async fn state(&self) -> ConnectionState;

    /// Establish the transport, run the handshake and cache the tool list.
    async fn connect(&self) -> Result<(), ProviderError>;

    /// Cached descriptors; `NotReady` if never successfully connected.
    async fn list_tools(&self) -> Result<Vec<Arc<ToolDescriptor>>, ProviderError>;

    async fn invoke_tool(&self, name: &str, arguments: Value) -> Result<Value, ProviderError>;

    /// Idempotent teardown. Never fails; problems are logged.
    async fn release(&self);

    /// Interval for background liveness pings, if the transport wants them.
    fn heartbeat_interval(&self) -> Option<Duration> {
        None
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Server-supplied usage guidance captured during the handshake.
    async fn instructions(&self) -> Option<String> {
        None
    }
}

/// A raw JSON-RPC link to an already-started provider.
#[async_trait]
pub trait RpcChannel: Send + Sync {
    /// Send a request and return its `result` member.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    async fn notify(&self, method: &str, params: Value) -> Result<(), ProviderError>;

    async fn close(&self) -> Result<(), ProviderError>;

    /// Returns `true` once after the provider announced a changed tool list.
    fn take_tools_changed(&self) -> bool {
        false
    }
}

/// Starts the transport of one provider (spawns the process, opens the stream).
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn RpcChannel>, ProviderError>;
}

use super::error::ProviderError;
use super::handshake;
use super::interface::{ConnectionState, Connector, ProviderConnection, RpcChannel};
use super::retry::RetryPolicy;
use crate::types::ToolDescriptor;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// A provider connection supervised by a [`RetryPolicy`].
///
/// The connector decides how the transport is started; everything else
/// (handshake, tool cache, invocation retries, reconnects, teardown) is
/// shared between the local-process and streamed-remote variants.
pub struct ManagedConnection {
    name: String,
    connector: Box<dyn Connector>,
    policy: RetryPolicy,
    live: AsyncMutex<Option<Arc<dyn RpcChannel>>>,
    tools: AsyncMutex<Option<Vec<Arc<ToolDescriptor>>>>,
    instructions: AsyncMutex<Option<String>>,
    state: AsyncMutex<ConnectionState>,
    lifecycle: AsyncMutex<()>,
}

impl ManagedConnection {
    pub fn new(name: impl Into<String>, connector: Box<dyn Connector>, policy: RetryPolicy) -> Self {
        Self {
            name: name.into(),
            connector,
            policy,
            live: AsyncMutex::new(None),
            tools: AsyncMutex::new(None),
            instructions: AsyncMutex::new(None),
            state: AsyncMutex::new(ConnectionState::Disconnected),
            lifecycle: AsyncMutex::new(()),
        }
    }

    async fn set_state(&self, next: ConnectionState) {
        *self.state.lock().await = next;
    }

    async fn connect_locked(&self) -> Result<(), ProviderError> {
        if self.live.lock().await.is_some() {
            return Ok(());
        }
        self.set_state(ConnectionState::Connecting).await;

        let attempts = self.policy.connect_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.open_once().await {
                Ok(tool_count) => {
                    self.set_state(ConnectionState::Ready).await;
                    info!(server = %self.name, attempt, tool_count, "connected to MCP server");
                    return Ok(());
                }
                Err(err) => {
                    warn!(server = %self.name, attempt, attempts, %err, "connect attempt failed");
                    last_error = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.connect_backoff(attempt)).await;
                    }
                }
            }
        }

        self.set_state(ConnectionState::Failed).await;
        let source = last_error.unwrap_or_else(|| ProviderError::NotReady {
            server: self.name.clone(),
        });
        Err(ProviderError::Connection {
            server: self.name.clone(),
            attempts,
            source: Box::new(source),
        })
    }

    /// One transport start plus handshake. Partial state is closed on failure.
    async fn open_once(&self) -> Result<usize, ProviderError> {
        let channel = self.connector.open().await?;
        match handshake::perform(&self.name, channel.as_ref()).await {
            Ok(outcome) => {
                let tool_count = outcome.tools.len();
                *self.tools.lock().await = Some(outcome.tools);
                *self.instructions.lock().await = outcome.instructions;
                *self.live.lock().await = Some(channel);
                Ok(tool_count)
            }
            Err(err) => {
                if let Err(close_err) = channel.close().await {
                    debug!(server = %self.name, %close_err, "failed to close half-open channel");
                }
                Err(err)
            }
        }
    }

    async fn release_locked(&self) {
        let channel = self.live.lock().await.take();
        if let Some(channel) = channel {
            if let Err(err) = channel.close().await {
                warn!(server = %self.name, %err, "error while releasing MCP server connection");
            }
            debug!(server = %self.name, "released MCP server connection");
        }
        self.tools.lock().await.take();
        self.instructions.lock().await.take();
        self.set_state(ConnectionState::Disconnected).await;
    }

    async fn reconnect(&self) {
        let _guard = self.lifecycle.lock().await;
        self.release_locked().await;
        if let Err(err) = self.connect_locked().await {
            warn!(server = %self.name, %err, "reconnect failed");
        }
    }

    async fn invoke_once(&self, name: &str, arguments: &Value) -> Result<Value, ProviderError> {
        let channel = self
            .live
            .lock()
            .await
            .clone()
            .ok_or_else(|| ProviderError::NotReady {
                server: self.name.clone(),
            })?;

        let params = json!({
            "name": name,
            "arguments": match arguments {
                Value::Null => Value::Object(Default::default()),
                other => other.clone(),
            }
        });
        let result = channel.request("tools/call", params).await?;
        if result.is_null() && self.policy.reject_empty_result {
            return Err(ProviderError::EmptyResult {
                server: self.name.clone(),
                tool: name.to_string(),
            });
        }
        Ok(result)
    }
}

#[async_trait]
impl ProviderConnection for ManagedConnection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    async fn connect(&self) -> Result<(), ProviderError> {
        let _guard = self.lifecycle.lock().await;
        self.connect_locked().await
    }

    async fn list_tools(&self) -> Result<Vec<Arc<ToolDescriptor>>, ProviderError> {
        let channel = self.live.lock().await.clone();
        if let Some(channel) = channel {
            if channel.take_tools_changed() {
                match handshake::fetch_tools(&self.name, channel.as_ref()).await {
                    Ok(tools) => *self.tools.lock().await = Some(tools),
                    Err(err) => {
                        warn!(server = %self.name, %err, "failed to refresh tool catalogue")
                    }
                }
            }
        }

        self.tools
            .lock()
            .await
            .clone()
            .ok_or_else(|| ProviderError::NotReady {
                server: self.name.clone(),
            })
    }

    async fn invoke_tool(&self, name: &str, arguments: Value) -> Result<Value, ProviderError> {
        let attempts = self.policy.invoke_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.invoke_once(name, &arguments).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(server = %self.name, tool = name, attempt, "tool call succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(err) => {
                    warn!(
                        server = %self.name,
                        tool = name,
                        attempt,
                        attempts,
                        %err,
                        "tool call attempt failed"
                    );
                    let fault = err.is_connection_fault();
                    last_error = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.invoke_backoff(attempt)).await;
                        if fault && self.policy.reconnect_on_fault {
                            info!(server = %self.name, "reconnecting before retry");
                            self.reconnect().await;
                        }
                    }
                }
            }
        }

        let source = last_error.unwrap_or_else(|| ProviderError::NotReady {
            server: self.name.clone(),
        });
        Err(ProviderError::ToolExecution {
            server: self.name.clone(),
            tool: name.to_string(),
            attempts,
            source: Box::new(source),
        })
    }

    async fn release(&self) {
        let _guard = self.lifecycle.lock().await;
        self.release_locked().await;
    }

    fn heartbeat_interval(&self) -> Option<Duration> {
        self.policy.heartbeat
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        let channel = self
            .live
            .lock()
            .await
            .clone()
            .ok_or_else(|| ProviderError::NotReady {
                server: self.name.clone(),
            })?;
        channel.request("ping", json!({})).await.map(|_| ())
    }

    async fn instructions(&self) -> Option<String> {
        self.instructions.lock().await.clone()
    }
}

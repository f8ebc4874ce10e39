use super::error::ProviderError;
use super::interface::{Connector, RpcChannel};
use super::rpc::{self, Inbound, PendingRequests};
use crate::config::{LocalProcessConfig, ProviderConfig, TransportConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

/// Spawns a provider as a child process speaking newline-delimited JSON-RPC.
pub struct ProcessConnector {
    name: String,
    config: LocalProcessConfig,
    request_timeout: Duration,
}

impl ProcessConnector {
    pub fn new(name: impl Into<String>, config: LocalProcessConfig, request_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            config,
            request_timeout,
        }
    }

    pub fn from_provider(provider: &ProviderConfig, request_timeout: Duration) -> Option<Self> {
        match &provider.transport {
            TransportConfig::LocalProcess(config) => {
                Some(Self::new(provider.name.clone(), config.clone(), request_timeout))
            }
            TransportConfig::StreamedRemote(_) => None,
        }
    }
}

#[async_trait]
impl Connector for ProcessConnector {
    async fn open(&self) -> Result<Arc<dyn RpcChannel>, ProviderError> {
        let mut command = Command::new(&self.config.command);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.workdir {
            command.current_dir(dir);
        }
        if !self.config.args.is_empty() {
            command.args(&self.config.args);
        }
        for (key, value) in &self.config.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| ProviderError::Spawn {
            server: self.name.clone(),
            source,
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::transport(&self.name, "failed to capture server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::transport(&self.name, "failed to capture server stdout"))?;
        debug!(server = %self.name, pid = ?child.id(), "spawned MCP server process");

        let channel = Arc::new(StdioChannel {
            server: self.name.clone(),
            child: AsyncMutex::new(Some(child)),
            writer: AsyncMutex::new(Some(BufWriter::new(stdin))),
            pending: PendingRequests::new(self.name.clone()),
            tools_changed: AtomicBool::new(false),
            request_timeout: self.request_timeout,
        });

        let reader = Arc::clone(&channel);
        tokio::spawn(async move {
            reader.reader_loop(stdout).await;
        });

        Ok(channel)
    }
}

struct StdioChannel {
    server: String,
    child: AsyncMutex<Option<Child>>,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    pending: PendingRequests,
    tools_changed: AtomicBool,
    request_timeout: Duration,
}

impl StdioChannel {
    async fn reader_loop(self: Arc<Self>, stdout: ChildStdout) {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(raw)) = lines.next_line().await {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('\u{1b}') {
                debug!(
                    server = %self.server,
                    line = trimmed,
                    "skipping non-JSON ANSI log line from MCP server"
                );
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => self.dispatch(value).await,
                Err(source) => {
                    warn!(
                        server = %self.server,
                        line = trimmed,
                        %source,
                        "received invalid JSON from MCP server"
                    );
                }
            }
        }

        debug!(server = %self.server, "MCP server closed its output stream");
        self.writer.lock().await.take();
        self.pending.fail_all().await;
    }

    async fn dispatch(&self, value: Value) {
        match rpc::classify(value) {
            Inbound::Response { id, message } => self.pending.resolve(&id, message).await,
            Inbound::Request { id, method } => {
                if method != "ping" {
                    warn!(server = %self.server, %method, "server sent unsupported request");
                }
                let reply = rpc::server_request_reply(id, &method);
                if let Err(err) = self.write_message(&reply).await {
                    warn!(server = %self.server, %err, "failed to answer server request");
                }
            }
            Inbound::Notification { method } => {
                debug!(server = %self.server, %method, "received notification from server");
                if method == rpc::TOOLS_CHANGED {
                    self.tools_changed.store(true, Ordering::SeqCst);
                }
            }
            Inbound::Unknown => {}
        }
    }

    async fn write_message(&self, message: &Value) -> Result<(), ProviderError> {
        let encoded = serde_json::to_string(message).map_err(|source| ProviderError::InvalidJson {
            server: self.server.clone(),
            source,
        })?;

        let mut writer = self.writer.lock().await;
        let stream = writer
            .as_mut()
            .ok_or_else(|| ProviderError::Terminated {
                server: self.server.clone(),
            })?;
        let io_error = |source: std::io::Error| ProviderError::transport(&self.server, source.to_string());
        stream.write_all(encoded.as_bytes()).await.map_err(io_error)?;
        stream.write_all(b"\n").await.map_err(io_error)?;
        stream.flush().await.map_err(io_error)?;
        Ok(())
    }
}

#[async_trait]
impl RpcChannel for StdioChannel {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let (id, rx) = self.pending.register().await;
        let payload = rpc::request_message(&id, method, params);
        if let Err(err) = self.write_message(&payload).await {
            self.pending.forget(&id).await;
            return Err(err);
        }
        self.pending
            .wait(&id, method, rx, self.request_timeout)
            .await
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), ProviderError> {
        self.write_message(&rpc::notification_message(method, params))
            .await
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.writer.lock().await.take();

        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            if let Err(err) = child.kill().await {
                debug!(
                    server = %self.server,
                    %err,
                    "failed to kill MCP server process (may have already exited)"
                );
            }
            let _ = child.wait().await;
        }

        self.pending.fail_all().await;
        Ok(())
    }

    fn take_tools_changed(&self) -> bool {
        self.tools_changed.swap(false, Ordering::SeqCst)
    }
}

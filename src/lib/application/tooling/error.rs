use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to spawn MCP server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("MCP server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("MCP server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("MCP server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("MCP server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("MCP server '{server}' request cancelled")]
    Cancelled { server: String },
    #[error("MCP server '{server}' did not answer '{method}' within {seconds}s")]
    Timeout {
        server: String,
        method: String,
        seconds: u64,
    },
    #[error("MCP server '{server}' is not connected")]
    NotReady { server: String },
    #[error("connection to MCP server '{server}' failed after {attempts} attempt(s): {source}")]
    Connection {
        server: String,
        attempts: u32,
        #[source]
        source: Box<ProviderError>,
    },
    #[error("tool '{tool}' on MCP server '{server}' returned no result")]
    EmptyResult { server: String, tool: String },
    #[error("tool '{tool}' on MCP server '{server}' failed after {attempts} attempt(s): {source}")]
    ToolExecution {
        server: String,
        tool: String,
        attempts: u32,
        #[source]
        source: Box<ProviderError>,
    },
}

impl ProviderError {
    pub fn transport(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Whether this failure points at the link itself rather than the tool.
    ///
    /// Besides the transport-level variants, an error whose own message
    /// mentions a connection counts, so RPC errors relayed from a gateway
    /// ("upstream connection reset") also trigger a reconnect. Server and
    /// tool names are never inspected.
    pub fn is_connection_fault(&self) -> bool {
        match self {
            ProviderError::Transport { .. }
            | ProviderError::Terminated { .. }
            | ProviderError::Cancelled { .. }
            | ProviderError::NotReady { .. }
            | ProviderError::Connection { .. } => true,
            ProviderError::Rpc { message, .. } => mentions_connection(message),
            ProviderError::Spawn { source, .. } => mentions_connection(&source.to_string()),
            ProviderError::ToolExecution { source, .. } => source.is_connection_fault(),
            ProviderError::InvalidJson { .. }
            | ProviderError::Timeout { .. }
            | ProviderError::EmptyResult { .. } => false,
        }
    }

    /// Text shown to the model and to API callers. The `Display` form
    /// already carries the underlying cause.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

fn mentions_connection(message: &str) -> bool {
    message.to_lowercase().contains("connection")
}

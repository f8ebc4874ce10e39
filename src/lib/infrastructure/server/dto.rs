use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSessionResponse {
    pub status: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub content: String,
    pub session_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionInfo {
    pub session_id: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    /// RFC 3339 timestamp of the last turn start or end
    pub last_activity: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteSessionResponse {
    pub status: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddServerRequest {
    pub name: String,
    /// One `mcpServers` entry: `{command, args, env}` or `{url, headers}`
    #[schema(value_type = Object)]
    pub config: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddServerResponse {
    pub status: String,
    pub message: String,
    pub exists: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServerInfo {
    pub name: String,
    /// `stdio` or `sse`
    pub kind: String,
    #[schema(value_type = Object)]
    pub config: Value,
    /// `active` when some live session is connected, else `inactive`
    pub status: String,
    pub connected: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteServerResponse {
    pub status: String,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServerListResponse {
    pub servers: Vec<ServerInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

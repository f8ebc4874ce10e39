use super::dto::{
    AddServerRequest, AddServerResponse, ChatRequest, CreateSessionResponse, DeleteServerResponse,
    DeleteSessionResponse, ErrorResponse, ServerInfo, ServerListResponse, SessionInfo,
    SessionListResponse,
};
use super::routes;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::chat::create_session_handler,
        routes::chat::chat_handler,
        routes::sessions::list_sessions_handler,
        routes::sessions::delete_session_handler,
        routes::servers::add_server_handler,
        routes::servers::list_servers_handler,
        routes::servers::delete_server_handler
    ),
    components(
        schemas(
            CreateSessionResponse,
            ChatRequest,
            SessionInfo,
            SessionListResponse,
            DeleteSessionResponse,
            AddServerRequest,
            AddServerResponse,
            ServerInfo,
            ServerListResponse,
            DeleteServerResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "sessions", description = "Session lifecycle"),
        (name = "chat", description = "Streaming conversation turns"),
        (name = "servers", description = "MCP server configuration")
    )
)]
pub(super) struct ApiDoc;

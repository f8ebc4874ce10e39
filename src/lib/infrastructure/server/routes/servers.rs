use super::super::dto::{
    AddServerRequest, AddServerResponse, DeleteServerResponse, ErrorResponse, ServerInfo,
    ServerListResponse,
};
use super::super::state::ServerState;
use crate::config::ProviderConfig;
use crate::session::{AddProviderOutcome, SessionError};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[utoipa::path(
    post,
    path = "/add_server",
    tag = "servers",
    request_body = AddServerRequest,
    responses(
        (status = 200, description = "Server added, or already present", body = AddServerResponse),
        (status = 400, description = "Invalid server configuration", body = AddServerResponse),
        (status = 502, description = "Server could not be reached", body = AddServerResponse),
        (status = 500, description = "Configuration could not be saved", body = AddServerResponse)
    )
)]
pub async fn add_server_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<AddServerRequest>,
) -> (StatusCode, Json<AddServerResponse>) {
    let AddServerRequest { name, config } = payload;
    info!(server = name.as_str(), "Received /add_server request");

    let provider = match ProviderConfig::from_entry(&name, &config) {
        Ok(provider) => provider,
        Err(err) => {
            warn!(server = name.as_str(), %err, "Rejecting invalid server configuration");
            return respond(StatusCode::BAD_REQUEST, "error", err.user_message(), false);
        }
    };

    match state.registry().add_provider(provider).await {
        Ok(AddProviderOutcome::Added) => respond(
            StatusCode::OK,
            "success",
            format!("Server {name} added"),
            false,
        ),
        Ok(AddProviderOutcome::AlreadyExists) => respond(
            StatusCode::OK,
            "warning",
            format!("Server {name} already exists"),
            true,
        ),
        Err(err) => {
            error!(server = name.as_str(), %err, "Failed to add server");
            let status = match err {
                SessionError::Probe { .. } => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            respond(status, "error", err.user_message(), false)
        }
    }
}

#[utoipa::path(
    get,
    path = "/servers",
    tag = "servers",
    responses((status = 200, description = "Configured MCP servers", body = ServerListResponse))
)]
pub async fn list_servers_handler(State(state): State<Arc<ServerState>>) -> Json<ServerListResponse> {
    let servers = state
        .registry()
        .provider_statuses()
        .await
        .into_iter()
        .map(|status| ServerInfo {
            name: status.config.name.clone(),
            kind: status.config.kind().to_string(),
            config: status.config.to_entry(),
            status: if status.connected { "active" } else { "inactive" }.to_string(),
            connected: status.connected,
        })
        .collect();
    Json(ServerListResponse { servers })
}

#[utoipa::path(
    delete,
    path = "/servers/{name}",
    tag = "servers",
    params(("name" = String, Path, description = "Server to remove from the configuration")),
    responses(
        (status = 200, description = "Server removed", body = DeleteServerResponse),
        (status = 404, description = "Unknown server", body = ErrorResponse),
        (status = 500, description = "Configuration could not be saved", body = ErrorResponse)
    )
)]
pub async fn delete_server_handler(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Result<Json<DeleteServerResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.registry().remove_provider(&name).await {
        Ok(true) => {
            info!(server = name.as_str(), "Server removed via REST");
            Ok(Json(DeleteServerResponse {
                status: "success".to_string(),
                name,
            }))
        }
        Ok(false) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("server '{name}' not found"),
            }),
        )),
        Err(err) => {
            error!(server = name.as_str(), %err, "Failed to remove server");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: err.user_message(),
                }),
            ))
        }
    }
}

fn respond(
    status: StatusCode,
    label: &str,
    message: String,
    exists: bool,
) -> (StatusCode, Json<AddServerResponse>) {
    (
        status,
        Json(AddServerResponse {
            status: label.to_string(),
            message,
            exists,
        }),
    )
}

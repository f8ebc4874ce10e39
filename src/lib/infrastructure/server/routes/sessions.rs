use super::super::dto::{DeleteSessionResponse, ErrorResponse, SessionInfo, SessionListResponse};
use super::super::state::ServerState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::info;

#[utoipa::path(
    get,
    path = "/api/sessions",
    tag = "sessions",
    responses((status = 200, description = "Live sessions, oldest first", body = SessionListResponse))
)]
pub async fn list_sessions_handler(State(state): State<Arc<ServerState>>) -> Json<SessionListResponse> {
    let sessions = state
        .registry()
        .sessions()
        .await
        .into_iter()
        .map(|summary| SessionInfo {
            session_id: summary.id,
            created_at: summary.created_at.to_rfc3339(),
            last_activity: summary.last_activity.to_rfc3339(),
        })
        .collect();
    Json(SessionListResponse { sessions })
}

#[utoipa::path(
    delete,
    path = "/api/sessions/{session_id}",
    tag = "sessions",
    params(("session_id" = String, Path, description = "Session to tear down")),
    responses(
        (status = 200, description = "Session torn down", body = DeleteSessionResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse)
    )
)]
pub async fn delete_session_handler(
    State(state): State<Arc<ServerState>>,
    Path(session_id): Path<String>,
) -> Result<Json<DeleteSessionResponse>, (StatusCode, Json<ErrorResponse>)> {
    if state.registry().teardown(&session_id).await {
        info!(session_id = session_id.as_str(), "Session torn down via REST");
        Ok(Json(DeleteSessionResponse {
            status: "success".to_string(),
            session_id,
        }))
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("session '{session_id}' not found"),
            }),
        ))
    }
}

use super::super::dto::{ChatRequest, CreateSessionResponse};
use super::super::state::ServerState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use futures::stream::{self, BoxStream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info};

/// Terminal payload of every chat stream.
pub const DONE_SENTINEL: &str = "[DONE]";

#[utoipa::path(
    post,
    path = "/api/create_session",
    tag = "sessions",
    responses(
        (status = 200, description = "Session created and all MCP servers connected", body = CreateSessionResponse),
        (status = 500, description = "A configured MCP server could not be connected", body = CreateSessionResponse)
    )
)]
pub async fn create_session_handler(
    State(state): State<Arc<ServerState>>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    match state.registry().create().await {
        Ok(session) => {
            info!(session_id = session.id(), "Created session via REST");
            (
                StatusCode::OK,
                Json(CreateSessionResponse {
                    status: "success".to_string(),
                    session_id: session.id().to_string(),
                    error: None,
                }),
            )
        }
        Err(err) => {
            error!(%err, "Failed to create session");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CreateSessionResponse {
                    status: "error".to_string(),
                    session_id: String::new(),
                    error: Some(err.user_message()),
                }),
            )
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "`text/event-stream` of `data:` fragments ending with `data: [DONE]`", content_type = "text/event-stream", body = String)
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let ChatRequest {
        content,
        session_id,
    } = payload;
    info!(session_id = session_id.as_str(), "Received /api/chat request");

    let fragments: BoxStream<'static, String> =
        match state.registry().get_or_create(&session_id).await {
            Ok(session) => session
                .process_message(content)
                .map(|event| event.to_string())
                .boxed(),
            Err(err) => {
                error!(session_id = session_id.as_str(), %err, "Chat request failed");
                stream::once(async move { format!("Error: {}", err.user_message()) }).boxed()
            }
        };

    let events = fragments
        .filter(|fragment| futures::future::ready(!fragment.is_empty()))
        .chain(stream::once(async { DONE_SENTINEL.to_string() }))
        .map(|fragment| Ok(Event::default().data(fragment)));

    Sse::new(events).keep_alive(KeepAlive::default())
}

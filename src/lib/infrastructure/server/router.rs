use super::docs::ApiDoc;
use super::error::ServerError;
use super::routes;
use super::state::ServerState;
use crate::session::SessionRegistry;
use axum::Router;
use axum::routing::{delete, get, post};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Routes over `registry`, with CORS open to any origin and the API docs mounted.
pub fn build_router(registry: Arc<SessionRegistry>) -> Router {
    let api = ApiDoc::openapi();
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = Arc::new(ServerState::new(registry));
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", api))
        .route(
            "/api/create_session",
            post(routes::chat::create_session_handler),
        )
        .route("/api/chat", post(routes::chat::chat_handler))
        .route("/api/sessions", get(routes::sessions::list_sessions_handler))
        .route(
            "/api/sessions/{session_id}",
            delete(routes::sessions::delete_session_handler),
        )
        .route("/add_server", post(routes::servers::add_server_handler))
        .route("/servers", get(routes::servers::list_servers_handler))
        .route("/servers/{name}", delete(routes::servers::delete_server_handler))
        .layer(cors)
        .with_state(state)
}

pub(super) async fn serve(
    registry: Arc<SessionRegistry>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    info!(%addr, "Binding REST server");
    let app = build_router(Arc::clone(&registry));

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "REST server ready to accept connections");

    let result = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve);

    info!("REST server stopped, tearing down sessions");
    registry.shutdown().await;
    result
}

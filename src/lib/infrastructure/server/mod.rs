mod docs;
mod dto;
mod error;
mod router;
mod routes;
mod state;

pub use error::ServerError;
pub use router::build_router;
pub use routes::chat::DONE_SENTINEL;

use crate::session::SessionRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Serve the session API until Ctrl-C, then tear down every session.
pub async fn serve(registry: Arc<SessionRegistry>, addr: SocketAddr) -> Result<(), ServerError> {
    router::serve(registry, addr, shutdown_signal()).await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => warn!(%err, "Failed to listen for shutdown signal"),
    }
}

use crate::session::SessionRegistry;
use std::sync::Arc;

pub(crate) struct ServerState {
    registry: Arc<SessionRegistry>,
}

impl ServerState {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}

//! Session registry: owns every live conversation and its provider connections.

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::{AddProviderOutcome, ProviderStatus, SessionRegistry, SessionSummary};
pub use session::Session;

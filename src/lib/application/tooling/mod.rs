mod catalog;
mod connection;
mod error;
mod factory;
mod handshake;
mod heartbeat;
mod interface;
mod process;
mod remote;
mod retry;
mod rpc;

pub use catalog::CapabilityCatalog;
pub use connection::ManagedConnection;
pub use error::ProviderError;
pub use factory::{ProviderFactory, TransportFactory};
pub use heartbeat::spawn_heartbeat;
pub use interface::{ConnectionState, Connector, ProviderConnection, RpcChannel};
pub use process::ProcessConnector;
pub use remote::RemoteConnector;
pub use retry::{Backoff, RetryPolicy};
